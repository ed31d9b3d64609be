//! Motion supervision.
//!
//! Owns the per-axis runtime state arena and drives the closed-loop
//! convergence iteration and homing resolution from the periodic polls.
//! All motion entry points validate axis activity and ordering invariants
//! before delegating to the axis driver.
//!
//! Invariants: a disabled axis is never `moving`, `searching` or `homing`;
//! an axis is never `homing` and `searching` at the same time.

use stage_common::consts::MAX_AXES;
use stage_common::error::{CmdResult, ErrorLatch, Fault, LatchMessage, Subsystem};
use stage_common::tokens::status;
use tracing::{error, info};

use crate::driver::port::{DriverPort, MemoryPort};
use crate::driver::{AxisDriver, DriverError, HomingStart, MotionStatus};
use crate::params::ParameterStore;

/// Factory producing the chip port for a hardware-backed axis.
pub type PortFactory = Box<dyn FnMut(usize) -> Box<dyn DriverPort>>;

/// Volatile per-axis runtime state.
#[derive(Debug, Clone, Copy)]
pub struct AxisState {
    /// Output stage enabled.
    pub enabled: bool,
    /// Homing run in progress.
    pub homing: bool,
    /// Motion in progress.
    pub moving: bool,
    /// Closed-loop correction in progress.
    pub searching: bool,
    /// Axis owned by the remote unit.
    pub remote_controlled: bool,
    /// Requested target of the current closed loop.
    pub target_position: i32,
    /// Corrected setpoint issued to the driver.
    pub set_position: i32,
    /// Remaining correction budget (−1 = unlimited).
    pub iterations_left: i32,
}

impl AxisState {
    const IDLE: AxisState = AxisState {
        enabled: false,
        homing: false,
        moving: false,
        searching: false,
        remote_controlled: false,
        target_position: 0,
        set_position: 0,
        iterations_left: 0,
    };
}

/// Per-axis motion state machine and poll driver.
pub struct MotionSupervisor {
    states: [AxisState; MAX_AXES],
    drivers: [AxisDriver; MAX_AXES],
    motion_latch: ErrorLatch,
    driver_latch: ErrorLatch,
    port_factory: PortFactory,
}

impl MotionSupervisor {
    /// Supervisor whose hardware axes talk to in-memory ports (simulation
    /// and bench setups).
    pub fn new() -> Self {
        Self::with_port_factory(Box::new(|_| Box::new(MemoryPort::new())))
    }

    /// Supervisor with an explicit chip-port factory.
    pub fn with_port_factory(port_factory: PortFactory) -> Self {
        Self {
            states: [AxisState::IDLE; MAX_AXES],
            drivers: std::array::from_fn(AxisDriver::unconfigured),
            motion_latch: ErrorLatch::new(),
            driver_latch: ErrorLatch::new(),
            port_factory,
        }
    }

    /// Runtime state of an axis.
    pub fn state(&self, axis: usize) -> &AxisState {
        &self.states[axis]
    }

    /// Driver of an axis (diagnostics and tests).
    pub fn driver_mut(&mut self, axis: usize) -> &mut AxisDriver {
        &mut self.drivers[axis]
    }

    // ─── Configuration ──────────────────────────────────────────────

    /// (Re)configure the driver of one axis from the parameter store and
    /// reset its runtime state.
    pub fn configure_axis(&mut self, axis: i32, params: &mut ParameterStore) -> CmdResult {
        if !params.is_valid_axis(axis, true) {
            return Err(Subsystem::Parameter);
        }
        let a = axis as usize;
        let kind = params.driver_kind(a);
        let row = *params.motor_params(a);
        self.states[a] = AxisState::IDLE;
        self.drivers[a].configure(kind, &row, &mut self.port_factory);
        Ok(())
    }

    // ─── Enable / Disable ───────────────────────────────────────────

    /// Switch an axis (or all active axes for −1) on or off. Disabling
    /// zeroes velocity, synchronously cancels a running homing and clears
    /// every motion flag.
    pub fn set_enable(&mut self, axis: i32, on: bool, params: &mut ParameterStore) -> CmdResult {
        if axis == -1 {
            for a in 0..MAX_AXES {
                if params.is_active(a as i32, false) {
                    self.apply_enable(a, on, params);
                }
            }
            return Ok(());
        }
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        self.apply_enable(axis as usize, on, params);
        Ok(())
    }

    fn apply_enable(&mut self, a: usize, on: bool, params: &ParameterStore) {
        let row = *params.motor_params(a);
        if on {
            self.drivers[a].set_enable(true, &row);
            self.states[a].enabled = true;
        } else {
            self.drivers[a].set_enable(false, &row);
            if self.states[a].homing {
                self.drivers[a].cancel_homing(&row);
            }
            let st = &mut self.states[a];
            st.enabled = false;
            st.homing = false;
            st.moving = false;
            st.searching = false;
        }
    }

    // ─── Motion Entry Points ────────────────────────────────────────

    /// Position move. Enters closed-loop searching when the axis has an
    /// encoder constant and a non-single iteration budget.
    pub fn move_to_position(
        &mut self,
        axis: i32,
        pos: i32,
        set_velocity: bool,
        params: &mut ParameterStore,
    ) -> CmdResult {
        self.check_ready(axis, params)?;
        let a = axis as usize;
        let row = *params.motor_params(a);
        let closed = self.drivers[a].closed_loop();
        let budget = self.drivers[a].max_iterations - 1;
        let st = &mut self.states[a];
        st.target_position = pos;
        st.set_position = pos;
        st.moving = true;
        st.searching = closed;
        // An open-loop move resets the budget so PULL reflects the latest
        // move, never a leftover from an earlier closed loop.
        st.iterations_left = if closed { budget } else { 0 };
        self.drivers[a].move_to_position(pos, set_velocity, &row);
        Ok(())
    }

    /// Velocity move. The axis counts as moving while the velocity is
    /// non-zero.
    pub fn move_at_velocity(&mut self, axis: i32, v: i32, params: &mut ParameterStore) -> CmdResult {
        self.check_ready(axis, params)?;
        let a = axis as usize;
        let row = *params.motor_params(a);
        match self.drivers[a].move_at_velocity(v, &row) {
            Ok(()) => {
                let st = &mut self.states[a];
                st.moving = v != 0;
                st.searching = false;
                Ok(())
            }
            Err(e) => {
                self.states[a].moving = false;
                self.latch_driver_error(e);
                Err(Subsystem::Driver)
            }
        }
    }

    /// Start a homing run.
    pub fn start_homing(&mut self, axis: i32, params: &mut ParameterStore) -> CmdResult {
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        let a = axis as usize;
        if !self.states[a].enabled {
            self.motion_latch.latch("Motor is not enabled");
            return Err(Subsystem::Motion);
        }
        if self.states[a].homing {
            self.motion_latch.latch("Motor is already homing");
            return Err(Subsystem::Motion);
        }
        let row = *params.motor_params(a);
        match self.drivers[a].start_homing(&row) {
            Ok(HomingStart::Started) => {
                self.states[a].homing = true;
                Ok(())
            }
            Ok(HomingStart::Completed) => Ok(()),
            Err(e) => {
                self.latch_driver_error(e);
                Err(Subsystem::Driver)
            }
        }
    }

    /// Silent re-origin; refused while the axis is in motion.
    pub fn set_x_position(&mut self, axis: i32, pos: i32, params: &mut ParameterStore) -> CmdResult {
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        let a = axis as usize;
        if self.states[a].moving || self.states[a].searching {
            self.motion_latch.latch("Motor is moving");
            return Err(Subsystem::Motion);
        }
        let row = *params.motor_params(a);
        self.drivers[a].set_x_position(pos, &row);
        Ok(())
    }

    fn check_ready(&mut self, axis: i32, params: &mut ParameterStore) -> CmdResult {
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        let a = axis as usize;
        if !self.states[a].enabled {
            self.motion_latch.latch("Motor is not enabled");
            return Err(Subsystem::Motion);
        }
        if self.states[a].homing {
            self.motion_latch.latch("Motor is homing");
            return Err(Subsystem::Motion);
        }
        Ok(())
    }

    // ─── Status Values ──────────────────────────────────────────────

    /// Write one status value. `ENAB` routes to enable handling (−1
    /// allowed); other writes are refused while the axis is remote-owned.
    pub fn set_status_value(
        &mut self,
        axis: i32,
        index: usize,
        value: i32,
        params: &mut ParameterStore,
    ) -> CmdResult {
        if index == status::ENAB {
            return self.set_enable(axis, value != 0, params);
        }
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        let a = axis as usize;
        if self.states[a].remote_controlled {
            self.motion_latch.latch("Motor is under remote control");
            return Err(Subsystem::Motion);
        }
        let row = *params.motor_params(a);
        match self.drivers[a].set_status_value(index, value, &row) {
            Ok(()) => {
                if index == status::VELO {
                    self.states[a].moving = value != 0;
                }
                Ok(())
            }
            Err(e) => {
                self.latch_driver_error(e);
                Err(Subsystem::Driver)
            }
        }
    }

    /// Read one status value.
    pub fn status_value(
        &mut self,
        axis: i32,
        index: usize,
        params: &mut ParameterStore,
    ) -> Result<i32, Subsystem> {
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        let a = axis as usize;
        match index {
            status::ENAB => Ok(self.states[a].enabled as i32),
            status::PULL => Ok(self.drivers[a].max_iterations - self.states[a].iterations_left),
            _ => Ok(self.drivers[a].status_value(index)),
        }
    }

    /// Packed status bitmask of an axis.
    pub fn status_flags(&mut self, axis: i32, params: &mut ParameterStore) -> Result<u32, Subsystem> {
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        let a = axis as usize;
        let row = *params.motor_params(a);
        let enabled = self.states[a].enabled;
        Ok(self.drivers[a].status_flags(enabled, &row).bits())
    }

    /// Motion-done query. For −1, `true` only when every active axis is
    /// neither moving nor searching.
    pub fn is_motion_done(&mut self, axis: i32, params: &mut ParameterStore) -> Result<bool, Subsystem> {
        if axis == -1 {
            for a in 0..MAX_AXES {
                if params.is_active(a as i32, false)
                    && (self.states[a].moving || self.states[a].searching)
                {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        let a = axis as usize;
        Ok(!(self.states[a].moving || self.states[a].searching))
    }

    /// Clear the driver's sticky status/event bits.
    pub fn clear_status(&mut self, axis: i32, params: &mut ParameterStore) -> CmdResult {
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        self.drivers[axis as usize].clear_status();
        Ok(())
    }

    /// Raw register read (diagnostics).
    pub fn read_register(&mut self, axis: i32, addr: u8, params: &mut ParameterStore) -> Result<i32, Subsystem> {
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        Ok(self.drivers[axis as usize].read_register(addr))
    }

    /// Raw register write (diagnostics).
    pub fn write_register(&mut self, axis: i32, addr: u8, value: i32, params: &mut ParameterStore) -> CmdResult {
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        self.drivers[axis as usize].write_register(addr, value);
        Ok(())
    }

    // ─── Remote Ownership ───────────────────────────────────────────

    /// Set remote ownership of an axis (−1 = all active axes).
    pub fn set_remote_controlled(&mut self, axis: i32, on: bool, params: &mut ParameterStore) -> CmdResult {
        if axis == -1 {
            for a in 0..MAX_AXES {
                if params.is_active(a as i32, false) {
                    self.states[a].remote_controlled = on;
                }
            }
            return Ok(());
        }
        if !params.is_active(axis, true) {
            return Err(Subsystem::Parameter);
        }
        self.states[axis as usize].remote_controlled = on;
        Ok(())
    }

    /// Whether an axis is currently remote-owned.
    pub fn is_remote_controlled(&self, axis: i32) -> bool {
        (0..MAX_AXES as i32).contains(&axis) && self.states[axis as usize].remote_controlled
    }

    // ─── Periodic Polls ─────────────────────────────────────────────

    /// Fault poll across all active axes. A fault forces the axis to
    /// disabled before it is surfaced.
    pub fn poll_faults(&mut self, params: &mut ParameterStore) {
        for a in 0..MAX_AXES {
            if !params.is_active(a as i32, false) {
                continue;
            }
            let row = *params.motor_params(a);
            if let Err(fault) = self.drivers[a].check_error(&row) {
                self.fault_disable(a, fault, params);
            }
        }
    }

    /// Motion poll across enabled axes: homing resolution, open-loop
    /// completion and the closed-loop correction iteration.
    pub fn poll_motion(&mut self, params: &mut ParameterStore) {
        for a in 0..MAX_AXES {
            if !self.states[a].enabled {
                continue;
            }
            let row = *params.motor_params(a);
            let homing = self.states[a].homing;

            let outcome = self.drivers[a].check_status(homing, &row);
            match outcome {
                Err(fault) => {
                    self.fault_disable(a, fault, params);
                }
                Ok(MotionStatus::HomingFinalized) => {
                    let st = &mut self.states[a];
                    st.homing = false;
                    st.moving = false;
                    info!(axis = a, "homing completed");
                }
                Ok(MotionStatus::Done) if self.states[a].searching => {
                    self.iterate_closed_loop(a, &row);
                }
                Ok(MotionStatus::Done) => {
                    self.states[a].moving = false;
                }
                Ok(MotionStatus::InMotion) => {}
            }
        }
    }

    /// One closed-loop correction step after the driver reported motion
    /// done.
    fn iterate_closed_loop(&mut self, a: usize, row: &crate::params::MotorParams) {
        let encoder = self.drivers[a].encoder_position();
        let tolerance = self.drivers[a].tolerance;
        let decrement = self.drivers[a].max_iterations > 1;
        let st = &mut self.states[a];
        let deviation = encoder - st.target_position;

        if deviation.abs() > tolerance {
            if st.iterations_left == -1 || st.iterations_left > 0 {
                if decrement {
                    st.iterations_left -= 1;
                }
                st.set_position -= deviation;
                st.moving = true;
                let setpoint = st.set_position;
                self.drivers[a].move_to_position(setpoint, false, row);
            } else {
                st.moving = false;
                st.searching = false;
                self.motion_latch.latch("Closed loop motion did not converge");
            }
        } else {
            st.moving = false;
            st.searching = false;
            if self.drivers[a].reset_after_cl {
                self.drivers[a].set_x_position(encoder, row);
            }
        }
    }

    fn fault_disable(&mut self, a: usize, fault: Fault, params: &ParameterStore) {
        let row = *params.motor_params(a);
        if self.states[a].homing {
            self.drivers[a].cancel_homing(&row);
        }
        self.drivers[a].set_enable(false, &row);
        let st = &mut self.states[a];
        st.enabled = false;
        st.homing = false;
        st.moving = false;
        st.searching = false;
        error!(axis = a, %fault, "axis fault, disabled");
        self.driver_latch.latch(&fault.to_string());
    }

    fn latch_driver_error(&mut self, e: DriverError) {
        self.driver_latch.latch(&e.to_string());
    }

    // ─── Error Latches ──────────────────────────────────────────────

    /// Read and clear the motion-subsystem latch.
    pub fn take_motion_error(&mut self) -> Option<LatchMessage> {
        self.motion_latch.take()
    }

    /// Read and clear the driver-subsystem latch.
    pub fn take_driver_error(&mut self) -> Option<LatchMessage> {
        self.driver_latch.take()
    }
}

impl Default for MotionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::bits::{gstat, Field};
    use crate::driver::port::MemoryPort;
    use stage_common::tokens::motor;
    use std::path::PathBuf;

    fn params() -> ParameterStore {
        ParameterStore::new(PathBuf::from("/nonexistent/params.bin"))
    }

    /// Axis 0 as a hardware axis on a shared in-memory port.
    fn hardware_setup(extra: impl Fn(&mut ParameterStore)) -> (MotionSupervisor, ParameterStore, MemoryPort) {
        let port = MemoryPort::new();
        let handle = port.clone();
        let mut sup = MotionSupervisor::with_port_factory(Box::new(move |_| {
            Box::new(handle.clone())
        }));
        let mut p = params();
        p.set_device_kind(0, 2).unwrap();
        p.set_motor_param(0, motor::RMXV, 10_000).unwrap();
        p.set_motor_param(0, motor::RSEV, 500).unwrap();
        p.set_motor_param(0, motor::MTOF, 3).unwrap();
        extra(&mut p);
        sup.configure_axis(0, &mut p).unwrap();
        (sup, p, port)
    }

    fn closed_loop_setup() -> (MotionSupervisor, ParameterStore, MemoryPort) {
        hardware_setup(|p| {
            p.set_motor_param(0, motor::ECON, 400).unwrap();
            p.set_motor_param(0, motor::EMAX, 3).unwrap();
            p.set_motor_param(0, motor::ETOL, 5).unwrap();
        })
    }

    // ── Ordering invariants ──

    #[test]
    fn moves_require_enable_and_activity() {
        let mut p = params();
        let mut sup = MotionSupervisor::new();
        sup.configure_axis(0, &mut p).unwrap();
        // Axis 2 is unpopulated by default.
        assert_eq!(sup.move_to_position(2, 10, true, &mut p), Err(Subsystem::Parameter));
        // Axis 0 is populated but disabled.
        assert_eq!(sup.move_to_position(0, 10, true, &mut p), Err(Subsystem::Motion));
        assert!(sup.take_motion_error().unwrap().contains("not enabled"));

        sup.set_enable(0, true, &mut p).unwrap();
        assert_eq!(sup.move_to_position(0, 10, true, &mut p), Ok(()));
    }

    #[test]
    fn disable_clears_all_motion_flags() {
        let mut p = params();
        p.set_motor_param(0, motor::RMXV, 1000).unwrap();
        let mut sup = MotionSupervisor::new();
        sup.configure_axis(0, &mut p).unwrap();
        sup.set_enable(0, true, &mut p).unwrap();
        sup.move_at_velocity(0, 100, &mut p).unwrap();
        assert!(sup.state(0).moving);

        sup.set_enable(0, false, &mut p).unwrap();
        let st = sup.state(0);
        assert!(!st.enabled && !st.moving && !st.searching && !st.homing);
    }

    // ── Closed loop ──

    #[test]
    fn closed_loop_corrects_then_exhausts_budget() {
        let (mut sup, mut p, port) = closed_loop_setup();
        sup.set_enable(0, true, &mut p).unwrap();
        sup.move_to_position(0, 1000, true, &mut p).unwrap();
        assert!(sup.state(0).searching);
        assert_eq!(sup.state(0).iterations_left, 2);

        // Encoder stuck at 990, outside tolerance 5.
        port.force_field(Field::EncoderPosition, 990);
        sup.poll_motion(&mut p);
        assert_eq!(sup.state(0).set_position, 1010);
        assert_eq!(sup.state(0).iterations_left, 1);
        assert!(sup.state(0).searching);

        sup.poll_motion(&mut p);
        assert_eq!(sup.state(0).iterations_left, 0);
        assert_eq!(sup.state(0).set_position, 1020);

        sup.poll_motion(&mut p);
        let st = sup.state(0);
        assert!(!st.moving && !st.searching && st.enabled);
        assert!(sup.is_motion_done(0, &mut p).unwrap());
        assert!(sup.take_motion_error().unwrap().contains("did not converge"));
    }

    #[test]
    fn closed_loop_converges_within_tolerance() {
        let (mut sup, mut p, port) = closed_loop_setup();
        p.set_motor_param(0, motor::ERST, 1).unwrap();
        sup.configure_axis(0, &mut p).unwrap();
        sup.set_enable(0, true, &mut p).unwrap();
        sup.move_to_position(0, 1000, true, &mut p).unwrap();

        port.force_field(Field::EncoderPosition, 997);
        sup.poll_motion(&mut p);
        let st = sup.state(0);
        assert!(!st.moving && !st.searching);
        // Reset-after-closed-loop rewrote the position to the encoder.
        assert_eq!(port.field(Field::ActualPosition), 997);
    }

    #[test]
    fn pull_in_tries_reports_budget_use() {
        let (mut sup, mut p, port) = closed_loop_setup();
        sup.set_enable(0, true, &mut p).unwrap();
        sup.move_to_position(0, 1000, true, &mut p).unwrap();
        port.force_field(Field::EncoderPosition, 990);
        sup.poll_motion(&mut p);
        // EMAX − iterationsLeft = 3 − 1.
        assert_eq!(sup.status_value(0, status::PULL, &mut p).unwrap(), 2);
    }

    #[test]
    fn open_loop_move_resets_the_correction_budget() {
        let (mut sup, mut p, port) = closed_loop_setup();
        sup.set_enable(0, true, &mut p).unwrap();
        sup.move_to_position(0, 1000, true, &mut p).unwrap();
        port.force_field(Field::EncoderPosition, 990);
        sup.poll_motion(&mut p);
        assert_eq!(sup.state(0).iterations_left, 1);

        // Same axis degraded to open loop with budget still outstanding.
        sup.drivers[0].enc_const = 0;
        sup.move_to_position(0, 2000, true, &mut p).unwrap();
        let st = sup.state(0);
        assert!(!st.searching);
        assert_eq!(st.iterations_left, 0);
        assert_eq!(sup.status_value(0, status::PULL, &mut p).unwrap(), 3);
    }

    // ── Homing ──

    #[test]
    fn homing_cancelled_by_disable() {
        let (mut sup, mut p, port) = hardware_setup(|p| {
            p.set_motor_param(0, motor::HMOD, 1).unwrap();
            p.set_motor_param(0, motor::HDIR, 1).unwrap();
            p.set_motor_param(0, motor::HVEL, 100).unwrap();
            p.set_motor_param(0, motor::SREN, 1).unwrap();
        });
        sup.set_enable(0, true, &mut p).unwrap();
        sup.start_homing(0, &mut p).unwrap();
        assert!(sup.state(0).homing);

        sup.set_enable(0, false, &mut p).unwrap();
        let st = sup.state(0);
        assert!(!st.homing && !st.moving && !st.enabled);
        // Nothing left armed.
        assert_eq!(port.field(Field::LatchRightArm), 0);
        assert_eq!(
            port.field(Field::VirtualStopRightEnable),
            p.motor_param(0, motor::LREN).unwrap()
        );
    }

    #[test]
    fn homing_refused_when_disabled_or_repeated() {
        let (mut sup, mut p, _port) = hardware_setup(|p| {
            p.set_motor_param(0, motor::HMOD, 1).unwrap();
            p.set_motor_param(0, motor::HDIR, 1).unwrap();
            p.set_motor_param(0, motor::SREN, 1).unwrap();
        });
        assert_eq!(sup.start_homing(0, &mut p), Err(Subsystem::Motion));
        let _ = sup.take_motion_error();

        sup.set_enable(0, true, &mut p).unwrap();
        sup.start_homing(0, &mut p).unwrap();
        assert_eq!(sup.start_homing(0, &mut p), Err(Subsystem::Motion));
        assert!(sup.take_motion_error().unwrap().contains("already homing"));
    }

    // ── Faults ──

    #[test]
    fn fault_poll_forces_disable_and_latches() {
        let (mut sup, mut p, port) = hardware_setup(|_| {});
        sup.set_enable(0, true, &mut p).unwrap();
        port.raise_field(Field::GlobalFaults, gstat::UNDERVOLTAGE);

        sup.poll_faults(&mut p);
        assert!(!sup.state(0).enabled);
        assert!(sup.take_driver_error().unwrap().contains("Undervoltage"));
    }

    // ── Remote ownership ──

    #[test]
    fn remote_ownership_blocks_status_writes() {
        let (mut sup, mut p, _port) = hardware_setup(|_| {});
        sup.set_enable(0, true, &mut p).unwrap();
        sup.set_remote_controlled(0, true, &mut p).unwrap();
        assert_eq!(
            sup.set_status_value(0, status::XACT, 5, &mut p),
            Err(Subsystem::Motion)
        );
        assert!(sup.take_motion_error().unwrap().contains("remote control"));
    }

    #[test]
    fn motion_done_across_all_axes() {
        let mut p = params();
        p.set_motor_param(1, motor::RMXV, 1000).unwrap();
        let mut sup = MotionSupervisor::new();
        sup.configure_axis(0, &mut p).unwrap();
        sup.configure_axis(1, &mut p).unwrap();
        sup.set_enable(-1, true, &mut p).unwrap();
        assert!(sup.is_motion_done(-1, &mut p).unwrap());

        sup.move_at_velocity(1, 50, &mut p).unwrap();
        assert!(!sup.is_motion_done(-1, &mut p).unwrap());
        assert!(sup.is_motion_done(0, &mut p).unwrap());
    }
}
