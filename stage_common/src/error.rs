//! Subsystem error codes, first-cause latches and fault classification.
//!
//! Every recoverable error belongs to one of five coarse subsystems, each
//! reported to the host as a small negative code. Each subsystem holds one
//! latched message with set-once-until-read semantics: a later error is
//! dropped while an earlier one is unread, preserving the first cause.

use core::fmt;
use thiserror::Error;

/// Capacity of a latched error message.
pub const LATCH_MESSAGE_CAP: usize = 96;

/// Fixed-capacity latched message text.
pub type LatchMessage = heapless::String<LATCH_MESSAGE_CAP>;

// ─── Subsystem Codes ────────────────────────────────────────────────

/// Error code reported when an operation succeeded.
pub const CODE_OK: i32 = 0;

/// Subsystem that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    /// Primary-link protocol errors.
    Link,
    /// Motion supervision errors (convergence, ordering).
    Motion,
    /// Axis-driver backend errors and hardware faults.
    Driver,
    /// Parameter store errors (bounds, tokens, persistence).
    Parameter,
    /// Secondary-link (remote unit) errors.
    Remote,
}

impl Subsystem {
    /// Wire code for this subsystem (`ERROR=<code>` responses).
    pub const fn code(self) -> i32 {
        match self {
            Subsystem::Link => -1,
            Subsystem::Motion => -2,
            Subsystem::Driver => -3,
            Subsystem::Parameter => -4,
            Subsystem::Remote => -5,
        }
    }

    /// Prefix used when concatenating latched messages for the host.
    pub const fn label(self) -> &'static str {
        match self {
            Subsystem::Link => "Serial",
            Subsystem::Motion => "Motion",
            Subsystem::Driver => "Driver",
            Subsystem::Parameter => "Params",
            Subsystem::Remote => "Remote",
        }
    }
}

/// Result of a dispatched command: `Err` names the failing subsystem.
pub type CmdResult = Result<(), Subsystem>;

/// Map a command result to its wire code.
pub fn wire_code(res: &CmdResult) -> i32 {
    match res {
        Ok(()) => CODE_OK,
        Err(sub) => sub.code(),
    }
}

// ─── Error Latch ────────────────────────────────────────────────────

/// One-shot error latch. Holds the first message set since the last read.
#[derive(Debug, Default)]
pub struct ErrorLatch {
    flag: bool,
    message: LatchMessage,
}

impl ErrorLatch {
    /// Create a cleared latch.
    pub const fn new() -> Self {
        Self {
            flag: false,
            message: LatchMessage::new(),
        }
    }

    /// Latch a message. Returns `false` (message dropped) if one is
    /// already pending. Text beyond the capacity is truncated.
    pub fn latch(&mut self, msg: &str) -> bool {
        if self.flag {
            return false;
        }
        self.flag = true;
        self.message.clear();
        for ch in msg.chars() {
            if self.message.push(ch).is_err() {
                break;
            }
        }
        true
    }

    /// Whether a message is pending.
    pub fn is_set(&self) -> bool {
        self.flag
    }

    /// Read and clear the pending message.
    pub fn take(&mut self) -> Option<LatchMessage> {
        if !self.flag {
            return None;
        }
        self.flag = false;
        Some(core::mem::take(&mut self.message))
    }
}

// ─── Fault Classification ───────────────────────────────────────────

/// Side of travel, used by limit and latch diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Negative direction of travel.
    Left,
    /// Positive direction of travel.
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "Left"),
            Side::Right => write!(f, "Right"),
        }
    }
}

/// Classified hardware fault. Raising one always disables the axis first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    /// The driver chip reported an unexpected reset.
    #[error("Driver reset detected")]
    Reset,
    /// Supply undervoltage on the charge pump.
    #[error("Undervoltage on the supply")]
    Undervoltage,
    /// Driver register contents were lost.
    #[error("Driver registers were reset")]
    RegisterReset,
    /// Winding short to the supply rail on one coil.
    #[error("Short to supply on coil {0}")]
    ShortToSupply(char),
    /// Winding short to ground on one coil.
    #[error("Short to ground on coil {0}")]
    ShortToGround(char),
    /// Open load detected on one coil.
    #[error("Open load on coil {0}")]
    OpenLoad(char),
    /// StallGuard reported a stall.
    #[error("Motor stall detected")]
    Stall,
    /// Driver overtemperature shutdown.
    #[error("Driver overtemperature")]
    OverTemperature,
    /// Driver overtemperature pre-warning threshold crossed.
    #[error("Driver overtemperature pre-warning")]
    OverTemperatureWarning,
    /// Encoder deviation exceeded the configured threshold.
    #[error("Encoder deviation exceeded the configured limit")]
    EncoderDeviation,
    /// A physical limit switch was reached during motion.
    #[error("{0} limit switch reached")]
    HardLimit(Side),
    /// The axis did not reach standstill within the homing timeout.
    #[error("Motor hasn't stopped after homing position reached")]
    StandstillTimeout,
    /// The axis did not reach the origin within the homing timeout.
    #[error("Motor hasn't returned to origin after homing")]
    OriginTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Subsystem codes ──

    #[test]
    fn subsystem_codes_match_wire_protocol() {
        assert_eq!(Subsystem::Link.code(), -1);
        assert_eq!(Subsystem::Motion.code(), -2);
        assert_eq!(Subsystem::Driver.code(), -3);
        assert_eq!(Subsystem::Parameter.code(), -4);
        assert_eq!(Subsystem::Remote.code(), -5);
        assert_eq!(wire_code(&Ok(())), CODE_OK);
        assert_eq!(wire_code(&Err(Subsystem::Parameter)), -4);
    }

    // ── Latch semantics ──

    #[test]
    fn latch_preserves_first_cause() {
        let mut latch = ErrorLatch::new();
        assert!(latch.latch("first"));
        assert!(!latch.latch("second"));
        assert_eq!(latch.take().unwrap().as_str(), "first");
        assert!(latch.take().is_none());
        assert!(latch.latch("third"));
        assert_eq!(latch.take().unwrap().as_str(), "third");
    }

    #[test]
    fn latch_truncates_oversized_messages() {
        let mut latch = ErrorLatch::new();
        let long = "x".repeat(LATCH_MESSAGE_CAP + 10);
        assert!(latch.latch(&long));
        assert_eq!(latch.take().unwrap().len(), LATCH_MESSAGE_CAP);
    }

    #[test]
    fn fault_messages_are_stable() {
        assert_eq!(Fault::Stall.to_string(), "Motor stall detected");
        assert_eq!(
            Fault::HardLimit(Side::Right).to_string(),
            "Right limit switch reached"
        );
        assert_eq!(Fault::ShortToSupply('A').to_string(), "Short to supply on coil A");
    }
}
