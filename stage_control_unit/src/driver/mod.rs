//! Per-axis driver capability surface.
//!
//! One [`AxisDriver`] per axis wraps either a simulated or a hardware
//! backend behind an identical contract. The backend is selected once at
//! configuration time; call sites never branch on the kind again.
//!
//! - [`bits`] - Named chip fields and status bit masks
//! - [`port`] - Register-level port trait and the in-memory port
//! - [`sim`] - Simulated backend (wall-clock velocity integration)
//! - [`hardware`] - Physical backend (latch homing, fault classification)

pub mod bits;
pub mod hardware;
pub mod port;
pub mod sim;

use bitflags::bitflags;
use stage_common::error::Fault;
use stage_common::tokens::{motor, status};
use stage_common::types::DriverKind;
use thiserror::Error;
use tracing::info;

use crate::params::MotorParams;
use hardware::HwBackend;
use port::DriverPort;
use sim::SimBackend;

bitflags! {
    /// Packed per-axis status bitmask reported to the host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        /// Left limit switch active.
        const STOP_LEFT = 1 << 0;
        /// Right limit switch active.
        const STOP_RIGHT = 1 << 1;
        /// Left virtual limit active.
        const VIRTUAL_LEFT = 1 << 2;
        /// Right virtual limit active.
        const VIRTUAL_RIGHT = 1 << 3;
        /// StallGuard threshold currently exceeded.
        const STALL_STATUS = 1 << 4;
        /// StallGuard stop event captured.
        const STALL_EVENT = 1 << 5;
        /// Encoder deviation warning.
        const ENCODER_DEVIATION = 1 << 6;
        /// Left latch captured a position.
        const LATCH_LEFT = 1 << 7;
        /// Right latch captured a position.
        const LATCH_RIGHT = 1 << 8;
        /// Axis in motion.
        const IN_MOTION = 1 << 9;
        /// Axis at target position.
        const AT_POSITION = 1 << 10;
        /// Output stage enabled.
        const ENABLED = 1 << 11;
    }
}

/// Error from a driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Operation refused before any hardware action (bad configuration,
    /// out-of-range request). The axis stays in its current state.
    #[error("{0}")]
    Refused(&'static str),
    /// Classified hardware fault; the backend disabled the axis already.
    #[error(transparent)]
    Fault(#[from] Fault),
}

/// Outcome of a completion poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionStatus {
    /// Motion still running.
    InMotion,
    /// Target reached / velocity zero.
    Done,
    /// The homing latch fired and finalization completed.
    HomingFinalized,
}

/// Outcome of starting a homing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingStart {
    /// Approach motion is running; the latch will resolve it.
    Started,
    /// Backend homed instantly (simulated).
    Completed,
}

enum Backend {
    None,
    Simulated(SimBackend),
    Hardware(HwBackend),
}

/// Driver for one axis: a backend plus the cached closed-loop control
/// values derived at configuration time.
pub struct AxisDriver {
    axis: usize,
    backend: Backend,
    /// Encoder constant; 0 means no encoder (open loop only).
    pub enc_const: i32,
    /// Closed-loop iteration budget (0 = unlimited, 1 = open loop).
    pub max_iterations: i32,
    /// Closed-loop convergence tolerance.
    pub tolerance: i32,
    /// Overwrite actual position with the encoder after convergence.
    pub reset_after_cl: bool,
}

impl AxisDriver {
    /// Create an unconfigured driver.
    pub fn unconfigured(axis: usize) -> Self {
        Self {
            axis,
            backend: Backend::None,
            enc_const: 0,
            max_iterations: 1,
            tolerance: 0,
            reset_after_cl: false,
        }
    }

    /// Select and configure the backend. The simulated backend never runs
    /// closed loop; the hardware backend caches the encoder parameters.
    pub fn configure(
        &mut self,
        kind: DriverKind,
        params: &MotorParams,
        make_port: &mut dyn FnMut(usize) -> Box<dyn DriverPort>,
    ) {
        match kind {
            DriverKind::None => {
                self.backend = Backend::None;
                self.enc_const = 0;
                self.max_iterations = 1;
                self.tolerance = 0;
                self.reset_after_cl = false;
            }
            DriverKind::Simulated => {
                self.backend = Backend::Simulated(SimBackend::new(params));
                self.enc_const = 0;
                self.max_iterations = 1;
                self.tolerance = params[motor::ETOL];
                self.reset_after_cl = false;
            }
            DriverKind::Hardware => {
                let mut hw = HwBackend::new(make_port(self.axis));
                hw.configure(params);
                self.backend = Backend::Hardware(hw);
                self.enc_const = params[motor::ECON];
                self.max_iterations = params[motor::EMAX];
                self.tolerance = params[motor::ETOL];
                self.reset_after_cl = params[motor::ERST] != 0;
            }
        }
        info!(axis = self.axis, ?kind, "axis driver configured");
    }

    /// Whether `move_to_position` enters the closed-loop searching state.
    pub fn closed_loop(&self) -> bool {
        (self.max_iterations == 0 || self.max_iterations > 1) && self.enc_const != 0
    }

    /// Switch the output stage.
    pub fn set_enable(&mut self, on: bool, params: &MotorParams) {
        match &mut self.backend {
            Backend::None => {}
            Backend::Simulated(sim) => {
                if !on {
                    sim.halt();
                }
            }
            Backend::Hardware(hw) => hw.set_enable(on, params),
        }
    }

    /// Position-mode move.
    pub fn move_to_position(&mut self, pos: i32, set_velocity: bool, params: &MotorParams) {
        match &mut self.backend {
            Backend::None => {}
            Backend::Simulated(sim) => sim.move_to_position(pos),
            Backend::Hardware(hw) => hw.move_to_position(pos, set_velocity, params),
        }
    }

    /// Velocity-mode move, range-checked against the max velocity.
    pub fn move_at_velocity(&mut self, v: i32, params: &MotorParams) -> Result<(), DriverError> {
        if v.abs() > params[motor::RMXV] {
            return Err(DriverError::Refused("Velocity out of range"));
        }
        match &mut self.backend {
            Backend::None => {}
            Backend::Simulated(sim) => sim.move_at_velocity(v),
            Backend::Hardware(hw) => hw.move_at_velocity(v),
        }
        Ok(())
    }

    /// Silent re-origin, no motion.
    pub fn set_x_position(&mut self, pos: i32, params: &MotorParams) {
        match &mut self.backend {
            Backend::None => {}
            Backend::Simulated(sim) => sim.set_position(pos),
            Backend::Hardware(hw) => hw.set_position(pos, params),
        }
    }

    /// Actual position.
    pub fn position(&mut self) -> i32 {
        match &mut self.backend {
            Backend::None => 0,
            Backend::Simulated(sim) => sim.position(),
            Backend::Hardware(hw) => hw.position(),
        }
    }

    /// Encoder position.
    pub fn encoder_position(&mut self) -> i32 {
        match &mut self.backend {
            Backend::None => 0,
            Backend::Simulated(sim) => sim.encoder_position(),
            Backend::Hardware(hw) => hw.encoder_position(),
        }
    }

    /// Write a status value. `ENAB`/`TEMP`/`PULL` are handled above this
    /// layer; velocity and acceleration are range-checked here.
    pub fn set_status_value(
        &mut self,
        index: usize,
        value: i32,
        params: &MotorParams,
    ) -> Result<(), DriverError> {
        match index {
            status::XACT => {
                self.set_x_position(value, params);
                Ok(())
            }
            status::XTAR => {
                self.move_to_position(value, false, params);
                Ok(())
            }
            status::XENC => {
                match &mut self.backend {
                    Backend::None => {}
                    Backend::Simulated(sim) => sim.set_position(value),
                    Backend::Hardware(hw) => hw.set_encoder_position(value),
                }
                Ok(())
            }
            status::VELO => {
                if value.abs() > params[motor::RMXV] {
                    return Err(DriverError::Refused("Velocity out of range"));
                }
                match &mut self.backend {
                    Backend::None => {}
                    Backend::Simulated(sim) => sim.move_at_velocity(value),
                    Backend::Hardware(hw) => hw.move_at_velocity(value),
                }
                Ok(())
            }
            status::ACCE => {
                if value < 0 || value > params[motor::RMXA] {
                    return Err(DriverError::Refused("Acceleration out of range"));
                }
                if let Backend::Hardware(hw) = &mut self.backend {
                    hw.set_acceleration(value);
                }
                Ok(())
            }
            _ => Err(DriverError::Refused("Status value is not writable")),
        }
    }

    /// Read a status value. `ENAB` and `PULL` live in the supervisor.
    pub fn status_value(&mut self, index: usize) -> i32 {
        match &mut self.backend {
            Backend::None => 0,
            Backend::Simulated(sim) => match index {
                status::XACT | status::XTAR => sim.position(),
                status::XENC => sim.encoder_position(),
                status::VELO => sim.velocity(),
                _ => 0,
            },
            Backend::Hardware(hw) => match index {
                status::XACT => hw.position(),
                status::XTAR => hw.target_position(),
                status::XENC => hw.encoder_position(),
                status::VELO => hw.velocity(),
                status::ACCE => hw.acceleration(),
                status::TEMP => hw.temperature(),
                _ => 0,
            },
        }
    }

    /// Packed status bitmask.
    pub fn status_flags(&mut self, enabled: bool, params: &MotorParams) -> StatusFlags {
        match &mut self.backend {
            Backend::None => StatusFlags::empty(),
            Backend::Simulated(sim) => sim.status_flags(enabled),
            Backend::Hardware(hw) => hw.status_flags(enabled, params),
        }
    }

    /// Poll fault bits. On a fault the backend has already disabled.
    pub fn check_error(&mut self, params: &MotorParams) -> Result<(), Fault> {
        match &mut self.backend {
            Backend::None | Backend::Simulated(_) => Ok(()),
            Backend::Hardware(hw) => hw.check_error(params),
        }
    }

    /// Poll completion/fault bits; resolves homing when the latch fired.
    pub fn check_status(
        &mut self,
        homing: bool,
        params: &MotorParams,
    ) -> Result<MotionStatus, Fault> {
        match &mut self.backend {
            Backend::None => Ok(MotionStatus::Done),
            Backend::Simulated(sim) => {
                if sim.motion_done() {
                    Ok(MotionStatus::Done)
                } else {
                    Ok(MotionStatus::InMotion)
                }
            }
            Backend::Hardware(hw) => hw.check_status(homing, params),
        }
    }

    /// Start a homing run.
    pub fn start_homing(&mut self, params: &MotorParams) -> Result<HomingStart, DriverError> {
        match &mut self.backend {
            Backend::None => Err(DriverError::Refused("Axis driver not configured")),
            Backend::Simulated(sim) => {
                sim.home();
                Ok(HomingStart::Completed)
            }
            Backend::Hardware(hw) => hw.start_homing(params),
        }
    }

    /// Undo homing arming without a position rewrite.
    pub fn cancel_homing(&mut self, params: &MotorParams) {
        if let Backend::Hardware(hw) = &mut self.backend {
            hw.cancel_homing(params);
        }
    }

    /// Clear sticky status/event bits.
    pub fn clear_status(&mut self) {
        if let Backend::Hardware(hw) = &mut self.backend {
            hw.clear_status();
        }
    }

    /// Raw register read; the simulated backend reports 0.
    pub fn read_register(&mut self, addr: u8) -> i32 {
        match &mut self.backend {
            Backend::Hardware(hw) => hw.read_register(addr),
            _ => 0,
        }
    }

    /// Raw register write; ignored by the simulated backend.
    pub fn write_register(&mut self, addr: u8, value: i32) {
        if let Backend::Hardware(hw) = &mut self.backend {
            hw.write_register(addr, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::port::MemoryPort;
    use stage_common::tokens::DEFAULT_MOTOR_PARAMS;

    fn mem_factory() -> impl FnMut(usize) -> Box<dyn DriverPort> {
        |_| Box::new(MemoryPort::new())
    }

    #[test]
    fn simulated_backend_never_closes_the_loop() {
        let mut p = DEFAULT_MOTOR_PARAMS;
        p[motor::ECON] = 400;
        p[motor::EMAX] = 5;
        let mut drv = AxisDriver::unconfigured(0);
        drv.configure(DriverKind::Simulated, &p, &mut mem_factory());
        assert!(!drv.closed_loop());
    }

    #[test]
    fn hardware_backend_caches_loop_parameters() {
        let mut p = DEFAULT_MOTOR_PARAMS;
        p[motor::ECON] = 400;
        p[motor::EMAX] = 3;
        p[motor::ETOL] = 5;
        p[motor::ERST] = 1;
        let mut drv = AxisDriver::unconfigured(1);
        drv.configure(DriverKind::Hardware, &p, &mut mem_factory());
        assert!(drv.closed_loop());
        assert_eq!(drv.max_iterations, 3);
        assert_eq!(drv.tolerance, 5);
        assert!(drv.reset_after_cl);
    }

    #[test]
    fn velocity_moves_are_range_checked() {
        let mut p = DEFAULT_MOTOR_PARAMS;
        p[motor::RMXV] = 100;
        let mut drv = AxisDriver::unconfigured(0);
        drv.configure(DriverKind::Simulated, &p, &mut mem_factory());
        assert!(drv.move_at_velocity(100, &p).is_ok());
        assert!(matches!(
            drv.move_at_velocity(-101, &p),
            Err(DriverError::Refused(_))
        ));
    }

    #[test]
    fn unconfigured_register_access_reports_zero() {
        let mut drv = AxisDriver::unconfigured(2);
        drv.write_register(7, 99);
        assert_eq!(drv.read_register(7), 0);
    }
}
