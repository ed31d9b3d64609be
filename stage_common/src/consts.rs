//! System-wide constants for the stage controller workspace.
//!
//! Single source of truth for axis limits, table sizes, task intervals
//! and protocol strings. Imported by all crates — no duplication permitted.

/// Maximum number of independently addressable axes.
pub const MAX_AXES: usize = 4;

/// Version tag written into the persisted parameter block.
pub const STORE_VERSION: i32 = 1;

/// Identity banner returned by `*IDN?`. Hosts match its prefix exactly.
pub const IDENTITY_BANNER: &str = "Stage Driver Pico";

/// Number of motor parameters per axis.
pub const MOTOR_PARAM_COUNT: usize = 34;

/// Number of remote-unit parameters per axis.
pub const REMOTE_PARAM_COUNT: usize = 5;

/// Number of per-axis status identifiers.
pub const STATUS_VALUE_COUNT: usize = 8;

/// Primary-link line poll interval.
pub const SERIAL_CHECK_INTERVAL_MS: u64 = 20;

/// Secondary-link frame poll interval.
pub const REMOTE_RECEIVE_INTERVAL_MS: u64 = 10;

/// Secondary-link position broadcast interval.
pub const REMOTE_SEND_INTERVAL_MS: u64 = 200;

/// Per-axis fault poll interval.
pub const FAULT_POLL_INTERVAL_MS: u64 = 50;

/// Per-axis motion/iteration poll interval.
pub const MOTION_POLL_INTERVAL_MS: u64 = 10;

/// Upper bound on the standstill / position-reached waits inside homing
/// finalization. Exceeding it is a fault, not success.
pub const HOMING_WAIT_TIMEOUT_MS: u64 = 1000;

/// Poll step used inside the bounded homing waits.
pub const HOMING_WAIT_POLL_MS: u64 = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(MAX_AXES > 0 && MAX_AXES <= 8);
        assert!(MOTOR_PARAM_COUNT == 34);
        assert!(REMOTE_PARAM_COUNT == 5);
        assert!(HOMING_WAIT_POLL_MS < HOMING_WAIT_TIMEOUT_MS);
    }
}
