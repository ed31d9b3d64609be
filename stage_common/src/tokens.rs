//! Parameter and status token tables.
//!
//! Every per-axis value addressable over the wire is identified by a fixed
//! 4-character token. The token order defines the storage index and is
//! stable for the process lifetime; the persisted block relies on it.

use crate::consts::{MOTOR_PARAM_COUNT, REMOTE_PARAM_COUNT, STATUS_VALUE_COUNT};

// ─── Motor Parameters ───────────────────────────────────────────────

/// Motor-parameter tokens, in storage order.
///
/// Groups: motor current, mode/microstepping/stall-detect, homing,
/// velocity/acceleration rates, encoder/closed-loop, limit switches,
/// soft (virtual) limits.
pub const MOTOR_PARAM_TOKENS: [&str; MOTOR_PARAM_COUNT] = [
    "CSCA", "CRAN", "CRUN", "CHOL", // current scaling / range / run / hold
    "MMIC", "MINV", "MTOF", "MSGE", "MSGT", "MTCT", // mode group
    "HMOD", "HDIR", "HVEL", "HSST", "HNEV", // homing group
    "RSEV", "RMXV", "RSEA", "RMXA", // rate group
    "ECON", "EDEV", "ETOL", "EMAX", "ERST", // encoder group
    "SLEN", "SREN", "SLPO", "SRPO", "SSWP", // switch group
    "LENC", "LLEN", "LREN", "LLPS", "LRPS", // soft-limit group
];

/// Storage indexes of the motor-parameter tokens.
pub mod motor {
    /// Global current scaler.
    pub const CSCA: usize = 0;
    /// Current range.
    pub const CRAN: usize = 1;
    /// Run current.
    pub const CRUN: usize = 2;
    /// Hold current.
    pub const CHOL: usize = 3;
    /// Microstep resolution.
    pub const MMIC: usize = 4;
    /// Invert motor direction.
    pub const MINV: usize = 5;
    /// Chopper off time (0 = output stage off).
    pub const MTOF: usize = 6;
    /// StallGuard enable.
    pub const MSGE: usize = 7;
    /// StallGuard threshold.
    pub const MSGT: usize = 8;
    /// CoolStep velocity threshold.
    pub const MTCT: usize = 9;
    /// Homing mode: 0 disabled, 1 limit switch, 2 index channel.
    pub const HMOD: usize = 10;
    /// Homing direction, ±1.
    pub const HDIR: usize = 11;
    /// Homing velocity.
    pub const HVEL: usize = 12;
    /// Soft-stop enable during homing, 0/1.
    pub const HSST: usize = 13;
    /// Index edge selection for index-channel homing, 0..=3.
    pub const HNEV: usize = 14;
    /// Set velocity for ordinary moves.
    pub const RSEV: usize = 15;
    /// Maximum velocity.
    pub const RMXV: usize = 16;
    /// Set acceleration.
    pub const RSEA: usize = 17;
    /// Maximum acceleration.
    pub const RMXA: usize = 18;
    /// Encoder constant (0 = no encoder).
    pub const ECON: usize = 19;
    /// Encoder deviation warning threshold.
    pub const EDEV: usize = 20;
    /// Closed-loop convergence tolerance.
    pub const ETOL: usize = 21;
    /// Closed-loop iteration budget (0 = unlimited, 1 = open loop).
    pub const EMAX: usize = 22;
    /// Overwrite actual position with encoder after closed loop, 0/1.
    pub const ERST: usize = 23;
    /// Left limit switch enable.
    pub const SLEN: usize = 24;
    /// Right limit switch enable.
    pub const SREN: usize = 25;
    /// Left switch polarity.
    pub const SLPO: usize = 26;
    /// Right switch polarity.
    pub const SRPO: usize = 27;
    /// Swap left/right switches.
    pub const SSWP: usize = 28;
    /// Soft limits act on encoder position, 0/1.
    pub const LENC: usize = 29;
    /// Left soft-limit enable.
    pub const LLEN: usize = 30;
    /// Right soft-limit enable.
    pub const LREN: usize = 31;
    /// Left soft-limit position.
    pub const LLPS: usize = 32;
    /// Right soft-limit position.
    pub const LRPS: usize = 33;
}

/// Compiled-in safe motor defaults: minimal current, encoder disabled,
/// single-attempt positioning, soft limits at ±1000.
pub const DEFAULT_MOTOR_PARAMS: [i32; MOTOR_PARAM_COUNT] = {
    let mut p = [0i32; MOTOR_PARAM_COUNT];
    p[motor::CSCA] = 128;
    p[motor::MMIC] = 3;
    p[motor::HDIR] = 1;
    p[motor::HNEV] = 1;
    p[motor::ETOL] = 1;
    p[motor::EMAX] = 1;
    p[motor::SLPO] = 1;
    p[motor::SRPO] = 1;
    p[motor::LLEN] = 1;
    p[motor::LREN] = 1;
    p[motor::LLPS] = -1000;
    p[motor::LRPS] = 1000;
    p
};

// ─── Remote Parameters ──────────────────────────────────────────────

/// Remote-unit parameter tokens, in storage order.
pub const REMOTE_PARAM_TOKENS: [&str; REMOTE_PARAM_COUNT] =
    ["ENAB", "JDIR", "JMAX", "EDIR", "ESTP"];

/// Storage indexes of the remote-parameter tokens.
pub mod remote {
    /// Remote control enabled for the axis, 0/1.
    pub const ENAB: usize = 0;
    /// Joystick direction, ±1.
    pub const JDIR: usize = 1;
    /// Joystick full-deflection velocity.
    pub const JMAX: usize = 2;
    /// Rotary-encoder direction, ±1.
    pub const EDIR: usize = 3;
    /// Rotary-encoder step size.
    pub const ESTP: usize = 4;
}

/// Compiled-in remote defaults.
pub const DEFAULT_REMOTE_PARAMS: [i32; REMOTE_PARAM_COUNT] = [0, 1, 1000, 1, 10];

// ─── Status Identifiers ─────────────────────────────────────────────

/// Per-axis status identifiers, in wire order.
pub const STATUS_TOKENS: [&str; STATUS_VALUE_COUNT] =
    ["XACT", "XTAR", "XENC", "VELO", "ACCE", "ENAB", "TEMP", "PULL"];

/// Indexes of the status identifiers.
pub mod status {
    /// Actual position.
    pub const XACT: usize = 0;
    /// Target position.
    pub const XTAR: usize = 1;
    /// Encoder position.
    pub const XENC: usize = 2;
    /// Velocity.
    pub const VELO: usize = 3;
    /// Acceleration.
    pub const ACCE: usize = 4;
    /// Enabled flag.
    pub const ENAB: usize = 5;
    /// Driver temperature (read-only).
    pub const TEMP: usize = 6;
    /// Pull-in tries used by the last closed loop (read-only).
    pub const PULL: usize = 7;
}

// ─── Lookups ────────────────────────────────────────────────────────

/// Index of a motor-parameter token, if known.
pub fn motor_param_index(token: &str) -> Option<usize> {
    MOTOR_PARAM_TOKENS.iter().position(|t| *t == token)
}

/// Index of a remote-parameter token, if known.
pub fn remote_param_index(token: &str) -> Option<usize> {
    REMOTE_PARAM_TOKENS.iter().position(|t| *t == token)
}

/// Index of a status identifier, if known.
pub fn status_index(token: &str) -> Option<usize> {
    STATUS_TOKENS.iter().position(|t| *t == token)
}

/// Whether a status identifier is read-only.
pub fn status_is_read_only(index: usize) -> bool {
    index == status::TEMP || index == status::PULL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_unique_and_indexed() {
        for (i, tok) in MOTOR_PARAM_TOKENS.iter().enumerate() {
            assert_eq!(tok.len(), 4);
            assert_eq!(motor_param_index(tok), Some(i));
        }
        for (i, tok) in REMOTE_PARAM_TOKENS.iter().enumerate() {
            assert_eq!(remote_param_index(tok), Some(i));
        }
        for (i, tok) in STATUS_TOKENS.iter().enumerate() {
            assert_eq!(status_index(tok), Some(i));
        }
        assert_eq!(motor_param_index("XXXX"), None);
    }

    #[test]
    fn index_constants_match_tokens() {
        assert_eq!(MOTOR_PARAM_TOKENS[motor::CSCA], "CSCA");
        assert_eq!(MOTOR_PARAM_TOKENS[motor::RMXV], "RMXV");
        assert_eq!(MOTOR_PARAM_TOKENS[motor::EMAX], "EMAX");
        assert_eq!(MOTOR_PARAM_TOKENS[motor::LRPS], "LRPS");
        assert_eq!(REMOTE_PARAM_TOKENS[remote::ENAB], "ENAB");
        assert_eq!(STATUS_TOKENS[status::PULL], "PULL");
    }

    #[test]
    fn defaults_are_fail_safe() {
        // No encoder, single positioning attempt, zero run current.
        assert_eq!(DEFAULT_MOTOR_PARAMS[motor::ECON], 0);
        assert_eq!(DEFAULT_MOTOR_PARAMS[motor::EMAX], 1);
        assert_eq!(DEFAULT_MOTOR_PARAMS[motor::CRUN], 0);
        assert_eq!(DEFAULT_MOTOR_PARAMS[motor::HMOD], 0);
        // Remote control starts released.
        assert_eq!(DEFAULT_REMOTE_PARAMS[remote::ENAB], 0);
    }
}
