//! Simulated axis backend.
//!
//! Integrates a stored velocity over elapsed wall-clock time, clamps to
//! the configured soft limits (clearing velocity on clamp) and treats
//! zero velocity as motion done. Position moves land instantly.

use std::time::Instant;

use stage_common::error::Side;
use stage_common::tokens::motor;
use tracing::debug;

use super::StatusFlags;
use crate::params::MotorParams;

/// Software-simulated driver backend for one axis.
#[derive(Debug)]
pub struct SimBackend {
    position: i32,
    encoder: i32,
    velocity: i32,
    min: i32,
    max: i32,
    clamped: Option<Side>,
    last_update: Instant,
}

impl SimBackend {
    /// Build a backend with travel limits derived from the soft-limit
    /// parameters (a disabled side is unbounded).
    pub fn new(params: &MotorParams) -> Self {
        let min = if params[motor::LLEN] != 0 {
            params[motor::LLPS]
        } else {
            i32::MIN
        };
        let max = if params[motor::LREN] != 0 {
            params[motor::LRPS]
        } else {
            i32::MAX
        };
        Self {
            position: 0,
            encoder: 0,
            velocity: 0,
            min,
            max,
            clamped: None,
            last_update: Instant::now(),
        }
    }

    /// Advance the kinematics up to `now`.
    fn advance(&mut self, now: Instant) {
        let elapsed_ms = now.duration_since(self.last_update).as_millis() as i64;
        if elapsed_ms == 0 {
            return;
        }
        self.last_update = now;
        if self.velocity == 0 {
            return;
        }
        let next = self.position as i64 + elapsed_ms * self.velocity as i64 / 1000;
        self.position = self.clamp(next);
        self.encoder = self.position;
    }

    fn clamp(&mut self, pos: i64) -> i32 {
        if pos <= self.min as i64 {
            self.velocity = 0;
            self.clamped = Some(Side::Left);
            debug!(limit = self.min, "simulated axis clamped at left limit");
            self.min
        } else if pos >= self.max as i64 {
            self.velocity = 0;
            self.clamped = Some(Side::Right);
            debug!(limit = self.max, "simulated axis clamped at right limit");
            self.max
        } else {
            self.clamped = None;
            pos as i32
        }
    }

    /// Jump to `pos` (clamped). Simulated position moves are instant.
    pub fn move_to_position(&mut self, pos: i32) {
        self.velocity = 0;
        self.position = self.clamp(pos as i64);
        self.encoder = self.position;
        self.last_update = Instant::now();
    }

    /// Start integrating at `v` counts per second.
    pub fn move_at_velocity(&mut self, v: i32) {
        self.advance(Instant::now());
        self.velocity = v;
        self.last_update = Instant::now();
    }

    /// Re-origin without motion.
    pub fn set_position(&mut self, pos: i32) {
        self.position = pos;
        self.encoder = pos;
    }

    /// Stop integration.
    pub fn halt(&mut self) {
        self.advance(Instant::now());
        self.velocity = 0;
    }

    /// Instant homing: re-origin and stop.
    pub fn home(&mut self) {
        self.position = 0;
        self.encoder = 0;
        self.velocity = 0;
        self.clamped = None;
        self.last_update = Instant::now();
    }

    /// Current position after integration.
    pub fn position(&mut self) -> i32 {
        self.advance(Instant::now());
        self.position
    }

    /// Current encoder reading (tracks position exactly).
    pub fn encoder_position(&mut self) -> i32 {
        self.advance(Instant::now());
        self.encoder
    }

    /// Commanded velocity.
    pub fn velocity(&self) -> i32 {
        self.velocity
    }

    /// Motion is done whenever velocity is zero.
    pub fn motion_done(&mut self) -> bool {
        self.advance(Instant::now());
        self.velocity == 0
    }

    /// Packed status flags for the simulated backend.
    pub fn status_flags(&mut self, enabled: bool) -> StatusFlags {
        self.advance(Instant::now());
        let mut flags = StatusFlags::empty();
        if enabled {
            flags |= StatusFlags::ENABLED;
        }
        if self.velocity != 0 {
            flags |= StatusFlags::IN_MOTION;
        } else {
            flags |= StatusFlags::AT_POSITION;
        }
        match self.clamped {
            Some(Side::Left) => flags |= StatusFlags::VIRTUAL_LEFT,
            Some(Side::Right) => flags |= StatusFlags::VIRTUAL_RIGHT,
            None => {}
        }
        flags
    }

    #[cfg(test)]
    fn rewind(&mut self, ms: u64) {
        self.last_update -= std::time::Duration::from_millis(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage_common::tokens::DEFAULT_MOTOR_PARAMS;

    fn params_with_limits(left: i32, right: i32) -> MotorParams {
        let mut p = DEFAULT_MOTOR_PARAMS;
        p[motor::LLPS] = left;
        p[motor::LRPS] = right;
        p
    }

    #[test]
    fn velocity_integrates_over_elapsed_time() {
        let mut sim = SimBackend::new(&params_with_limits(-10_000, 10_000));
        sim.move_at_velocity(500);
        sim.rewind(100); // pretend 100 ms passed
        assert_eq!(sim.position(), 50);
        assert!(!sim.motion_done());
    }

    #[test]
    fn clamp_zeroes_velocity_and_flags_limit() {
        let mut sim = SimBackend::new(&params_with_limits(-100, 100));
        sim.move_at_velocity(1000);
        sim.rewind(1000); // would travel to 1000, clamps at 100
        assert_eq!(sim.position(), 100);
        assert_eq!(sim.velocity(), 0);
        assert!(sim.motion_done());
        assert!(sim.status_flags(true).contains(StatusFlags::VIRTUAL_RIGHT));
    }

    #[test]
    fn position_moves_are_instant_and_clamped() {
        let mut sim = SimBackend::new(&params_with_limits(-100, 100));
        sim.move_to_position(42);
        assert_eq!(sim.position(), 42);
        assert_eq!(sim.encoder_position(), 42);
        sim.move_to_position(500);
        assert_eq!(sim.position(), 100);
    }

    #[test]
    fn homing_reorigins_instantly() {
        let mut sim = SimBackend::new(&params_with_limits(-100, 100));
        sim.move_to_position(42);
        sim.home();
        assert_eq!(sim.position(), 0);
        assert!(sim.motion_done());
    }
}
