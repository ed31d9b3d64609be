//! Hardware axis backend.
//!
//! Maps the capability surface onto the register fields of a physical
//! stepper-driver chip through a [`DriverPort`]. Owns the hardware-assisted
//! homing sequence: latch arming, bounded standstill wait, origin rewrite
//! and limit restoration.

use std::thread;
use std::time::{Duration, Instant};

use stage_common::consts::{HOMING_WAIT_POLL_MS, HOMING_WAIT_TIMEOUT_MS};
use stage_common::error::{Fault, Side};
use stage_common::tokens::motor;
use tracing::{debug, warn};

use super::bits::{drv, enc, gstat, ramp, ramp_mode, Field};
use super::port::DriverPort;
use super::{DriverError, HomingStart, MotionStatus, StatusFlags};
use crate::params::MotorParams;

/// Physical driver backend for one axis.
pub struct HwBackend {
    port: Box<dyn DriverPort>,
}

impl HwBackend {
    /// Wrap a chip port.
    pub fn new(port: Box<dyn DriverPort>) -> Self {
        Self { port }
    }

    /// Push the full parameter row into the chip. The output stage stays
    /// off until an explicit enable.
    pub fn configure(&mut self, params: &MotorParams) {
        let p = &mut self.port;
        p.write_field(Field::ChopperOffTime, 0);
        p.write_field(Field::GlobalScaler, params[motor::CSCA]);
        p.write_field(Field::CurrentRange, params[motor::CRAN]);
        p.write_field(Field::RunCurrent, params[motor::CRUN]);
        p.write_field(Field::HoldCurrent, params[motor::CHOL]);
        p.write_field(Field::MicrostepResolution, params[motor::MMIC]);
        p.write_field(Field::InvertShaft, params[motor::MINV]);
        p.write_field(Field::StallGuardEnable, params[motor::MSGE]);
        p.write_field(Field::StallGuardThreshold, params[motor::MSGT]);
        p.write_field(Field::CoolStepThreshold, params[motor::MTCT]);
        p.write_field(Field::StopLeftEnable, params[motor::SLEN]);
        p.write_field(Field::StopRightEnable, params[motor::SREN]);
        p.write_field(Field::StopLeftPolarity, params[motor::SLPO]);
        p.write_field(Field::StopRightPolarity, params[motor::SRPO]);
        p.write_field(Field::SwapStops, params[motor::SSWP]);
        p.write_field(Field::VirtualStopEncoderSelect, params[motor::LENC]);
        p.write_field(Field::VirtualStopLeftEnable, params[motor::LLEN]);
        p.write_field(Field::VirtualStopRightEnable, params[motor::LREN]);
        p.write_field(Field::VirtualStopLeft, params[motor::LLPS]);
        p.write_field(Field::VirtualStopRight, params[motor::LRPS]);
        p.write_field(Field::EncoderConstant, params[motor::ECON]);
        p.write_field(Field::EncoderDeviationLimit, params[motor::EDEV]);
        p.write_field(Field::MaxAcceleration, params[motor::RSEA]);
        p.write_field(Field::MaxDeceleration, params[motor::RSEA]);
        p.write_field(Field::MaxVelocity, 0);
        p.write_field(Field::RampMode, ramp_mode::HOLD);
        self.clear_status();
    }

    /// Switch the output stage. Disabling zeroes velocity first so that
    /// position integration stops before power-off.
    pub fn set_enable(&mut self, on: bool, params: &MotorParams) {
        if on {
            self.port.write_field(Field::ChopperOffTime, params[motor::MTOF]);
        } else {
            self.port.write_field(Field::RampMode, ramp_mode::VELOCITY_POS);
            self.port.write_field(Field::MaxVelocity, 0);
            self.port.write_field(Field::ChopperOffTime, 0);
        }
    }

    /// Position-mode move. Resets the set velocity only when asked, so
    /// closed-loop retargets do not restart the ramp profile.
    pub fn move_to_position(&mut self, pos: i32, set_velocity: bool, params: &MotorParams) {
        if set_velocity {
            self.port.write_field(Field::MaxVelocity, params[motor::RSEV]);
        }
        self.port.write_field(Field::RampMode, ramp_mode::POSITION);
        self.port.write_field(Field::RampStatus, ramp::EVENT_POS_REACHED);
        self.port.write_field(Field::TargetPosition, pos);
    }

    /// Velocity-mode move (range already checked by the caller).
    pub fn move_at_velocity(&mut self, v: i32) {
        let mode = if v >= 0 {
            ramp_mode::VELOCITY_POS
        } else {
            ramp_mode::VELOCITY_NEG
        };
        self.port.write_field(Field::RampMode, mode);
        self.port.write_field(Field::MaxVelocity, v.abs());
    }

    /// Silent re-origin of the position counters.
    pub fn set_position(&mut self, pos: i32, params: &MotorParams) {
        self.port.write_field(Field::ActualPosition, pos);
        if params[motor::ECON] != 0 {
            self.port.write_field(Field::EncoderPosition, pos);
        }
    }

    /// Actual position counter.
    pub fn position(&mut self) -> i32 {
        self.port.read_field(Field::ActualPosition)
    }

    /// Encoder position counter.
    pub fn encoder_position(&mut self) -> i32 {
        self.port.read_field(Field::EncoderPosition)
    }

    /// Overwrite the encoder position counter.
    pub fn set_encoder_position(&mut self, pos: i32) {
        self.port.write_field(Field::EncoderPosition, pos);
    }

    /// Target position register.
    pub fn target_position(&mut self) -> i32 {
        self.port.read_field(Field::TargetPosition)
    }

    /// Velocity setpoint.
    pub fn velocity(&mut self) -> i32 {
        self.port.read_field(Field::MaxVelocity)
    }

    /// Acceleration setpoint.
    pub fn acceleration(&mut self) -> i32 {
        self.port.read_field(Field::MaxAcceleration)
    }

    /// Write the acceleration setpoint (and matching deceleration).
    pub fn set_acceleration(&mut self, v: i32) {
        self.port.write_field(Field::MaxAcceleration, v);
        self.port.write_field(Field::MaxDeceleration, v);
    }

    /// Die temperature reading.
    pub fn temperature(&mut self) -> i32 {
        self.port.read_field(Field::AdcTemperature)
    }

    /// Raw register read.
    pub fn read_register(&mut self, addr: u8) -> i32 {
        self.port.read_register(addr)
    }

    /// Raw register write.
    pub fn write_register(&mut self, addr: u8, value: i32) {
        self.port.write_register(addr, value);
    }

    /// Clear all sticky status/event bits.
    pub fn clear_status(&mut self) {
        self.port.write_field(Field::RampStatus, -1);
        self.port.write_field(Field::EncoderStatus, -1);
        self.port.write_field(Field::GlobalFaults, -1);
    }

    /// Packed status flags.
    pub fn status_flags(&mut self, enabled: bool, params: &MotorParams) -> StatusFlags {
        let rs = self.port.read_field(Field::RampStatus);
        let mut flags = StatusFlags::empty();
        if enabled {
            flags |= StatusFlags::ENABLED;
        }
        if rs & ramp::POSITION_REACHED != 0 {
            flags |= StatusFlags::AT_POSITION;
        }
        if rs & ramp::VELOCITY_ZERO == 0 {
            flags |= StatusFlags::IN_MOTION;
        }
        if rs & ramp::STATUS_LATCH_L != 0 {
            flags |= StatusFlags::LATCH_LEFT;
        }
        if rs & ramp::STATUS_LATCH_R != 0 {
            flags |= StatusFlags::LATCH_RIGHT;
        }
        if rs & ramp::STATUS_SG != 0 {
            flags |= StatusFlags::STALL_STATUS;
        }
        if rs & ramp::EVENT_STOP_SG != 0 {
            flags |= StatusFlags::STALL_EVENT;
        }
        if rs & ramp::STATUS_VSTOP_L != 0 {
            flags |= StatusFlags::VIRTUAL_LEFT;
        }
        if rs & ramp::STATUS_VSTOP_R != 0 {
            flags |= StatusFlags::VIRTUAL_RIGHT;
        }
        if rs & ramp::STATUS_STOP_L != 0 {
            flags |= StatusFlags::STOP_LEFT;
        }
        if rs & ramp::STATUS_STOP_R != 0 {
            flags |= StatusFlags::STOP_RIGHT;
        }
        if params[motor::ECON] != 0
            && self.port.read_field(Field::EncoderStatus) & enc::DEVIATION != 0
        {
            flags |= StatusFlags::ENCODER_DEVIATION;
        }
        flags
    }

    // ─── Fault Polling ──────────────────────────────────────────────

    /// Poll the global fault bits. Any fault disables the axis before it
    /// is reported.
    pub fn check_error(&mut self, params: &MotorParams) -> Result<(), Fault> {
        let g = self.port.read_field(Field::GlobalFaults);
        if g == 0 {
            return Ok(());
        }
        let fault = if g & gstat::DRIVER_ERROR != 0 {
            let d = self.port.read_field(Field::DriveFaults);
            if d & drv::SHORT_SUPPLY_A != 0 {
                Fault::ShortToSupply('A')
            } else if d & drv::SHORT_SUPPLY_B != 0 {
                Fault::ShortToSupply('B')
            } else if d & drv::SHORT_GND_A != 0 {
                Fault::ShortToGround('A')
            } else if d & drv::SHORT_GND_B != 0 {
                Fault::ShortToGround('B')
            } else if d & drv::OPEN_LOAD_A != 0 {
                Fault::OpenLoad('A')
            } else if d & drv::OPEN_LOAD_B != 0 {
                Fault::OpenLoad('B')
            } else if d & drv::STALLED != 0 {
                Fault::Stall
            } else if d & drv::OVERTEMP != 0 {
                Fault::OverTemperature
            } else {
                Fault::OverTemperatureWarning
            }
        } else if g & gstat::UNDERVOLTAGE != 0 {
            Fault::Undervoltage
        } else if g & gstat::REGISTER_RESET != 0 {
            Fault::RegisterReset
        } else {
            Fault::Reset
        };
        self.set_enable(false, params);
        self.port.write_field(Field::GlobalFaults, g);
        Err(fault)
    }

    // ─── Motion Polling ─────────────────────────────────────────────

    /// Poll completion/fault bits. During homing a captured latch triggers
    /// finalization and reports its outcome.
    pub fn check_status(
        &mut self,
        homing: bool,
        params: &MotorParams,
    ) -> Result<MotionStatus, Fault> {
        if params[motor::ECON] != 0 {
            let es = self.port.read_field(Field::EncoderStatus);
            if es & enc::DEVIATION != 0 {
                self.set_enable(false, params);
                return Err(Fault::EncoderDeviation);
            }
        }

        let rs = self.port.read_field(Field::RampStatus);

        if rs & ramp::EVENT_STOP_SG != 0 {
            self.set_enable(false, params);
            return Err(Fault::Stall);
        }

        if homing && rs & (ramp::STATUS_LATCH_L | ramp::STATUS_LATCH_R) != 0 {
            self.end_homing(params)?;
            return Ok(MotionStatus::HomingFinalized);
        }

        if rs & ramp::EVENT_STOP_L != 0 {
            self.port.write_field(Field::RampStatus, ramp::EVENT_STOP_L);
            if params[motor::SLEN] != 0 {
                self.set_enable(false, params);
                return Err(Fault::HardLimit(Side::Left));
            }
            warn!("left virtual limit stopped the motion");
        }
        if rs & ramp::EVENT_STOP_R != 0 {
            self.port.write_field(Field::RampStatus, ramp::EVENT_STOP_R);
            if params[motor::SREN] != 0 {
                self.set_enable(false, params);
                return Err(Fault::HardLimit(Side::Right));
            }
            warn!("right virtual limit stopped the motion");
        }

        if rs & (ramp::EVENT_POS_REACHED | ramp::POSITION_REACHED) != 0 {
            self.port.write_field(Field::RampStatus, ramp::EVENT_POS_REACHED);
            Ok(MotionStatus::Done)
        } else {
            Ok(MotionStatus::InMotion)
        }
    }

    // ─── Homing ─────────────────────────────────────────────────────

    /// Validate the homing configuration and start the constant-velocity
    /// approach with the latch armed.
    pub fn start_homing(&mut self, params: &MotorParams) -> Result<HomingStart, DriverError> {
        let mode = params[motor::HMOD];
        let dir = params[motor::HDIR];
        let vel = params[motor::HVEL];

        if !(0..=1).contains(&params[motor::HSST]) {
            return Err(DriverError::Refused("Invalid soft-stop configuration"));
        }
        if mode != 1 && mode != 2 {
            return Err(DriverError::Refused("Homing disabled by config setting"));
        }
        if dir.abs() != 1 {
            return Err(DriverError::Refused(
                "Homing direction undefined (needs -1 or 1)",
            ));
        }
        if mode == 1 {
            let switch_enabled = if dir > 0 {
                params[motor::SREN] != 0
            } else {
                params[motor::SLEN] != 0
            };
            if !switch_enabled {
                return Err(DriverError::Refused(
                    "Homing only allowed if switch is enabled",
                ));
            }
        }
        if mode == 2 && !(0..=3).contains(&params[motor::HNEV]) {
            return Err(DriverError::Refused("Invalid index event configuration"));
        }
        if vel < 0 || vel > params[motor::RMXV] {
            return Err(DriverError::Refused("Homing velocity out of range"));
        }

        self.port.write_field(Field::SoftStopEnable, params[motor::HSST]);
        if mode == 2 {
            self.port.write_field(Field::IndexEventConfig, params[motor::HNEV]);
        }
        // Open the commanded side past its virtual limit and arm the latch.
        if dir > 0 {
            self.port.write_field(Field::VirtualStopRightEnable, 0);
            self.port.write_field(Field::LatchRightArm, 1);
        } else {
            self.port.write_field(Field::VirtualStopLeftEnable, 0);
            self.port.write_field(Field::LatchLeftArm, 1);
        }
        self.port.write_field(Field::RampStatus, ramp::ALL_EVENTS);

        let mode_value = if dir > 0 {
            ramp_mode::VELOCITY_POS
        } else {
            ramp_mode::VELOCITY_NEG
        };
        self.port.write_field(Field::RampMode, mode_value);
        self.port.write_field(Field::MaxVelocity, vel);
        debug!(dir, vel, mode, "homing approach started");
        Ok(HomingStart::Started)
    }

    /// Finalize homing after the latch fired: bounded standstill wait,
    /// origin rewrite to `current − latch`, limit restoration and an
    /// ordinary move back to 0.
    pub fn end_homing(&mut self, params: &MotorParams) -> Result<(), Fault> {
        if !self.wait_for(|p| p.read_field(Field::DriveFaults) & drv::STANDSTILL != 0) {
            self.set_enable(false, params);
            return Err(Fault::StandstillTimeout);
        }

        self.set_enable(false, params);

        let current = self.port.read_field(Field::ActualPosition);
        let latch = self.port.read_field(Field::LatchPosition);
        self.port.write_field(Field::ActualPosition, current - latch);
        if params[motor::ECON] != 0 {
            // Both counters restart from the same step-counter origin,
            // regardless of any accumulated encoder drift.
            self.port.write_field(Field::EncoderPosition, current - latch);
            self.port.write_field(Field::EncoderStatus, -1);
        }
        debug!(current, latch, "homing origin rewritten");

        self.restore_after_homing(params);
        self.port.write_field(Field::ChopperOffTime, params[motor::MTOF]);

        self.move_to_position(0, true, params);
        if !self.wait_for(|p| p.read_field(Field::RampStatus) & ramp::POSITION_REACHED != 0) {
            self.set_enable(false, params);
            return Err(Fault::OriginTimeout);
        }
        if params[motor::ECON] != 0 {
            self.port.write_field(Field::EncoderPosition, 0);
        }
        Ok(())
    }

    /// Undo the homing arming without touching positions. Used when an
    /// axis is disabled while homing.
    pub fn cancel_homing(&mut self, params: &MotorParams) {
        self.restore_after_homing(params);
    }

    fn restore_after_homing(&mut self, params: &MotorParams) {
        self.port.write_field(Field::VirtualStopLeftEnable, params[motor::LLEN]);
        self.port.write_field(Field::VirtualStopRightEnable, params[motor::LREN]);
        self.port.write_field(Field::LatchLeftArm, 0);
        self.port.write_field(Field::LatchRightArm, 0);
        self.port.write_field(Field::RampStatus, ramp::ALL_EVENTS);
    }

    /// Bounded busy wait on a port condition. Polls first, so an already
    /// satisfied condition costs no sleep.
    fn wait_for(&mut self, cond: impl Fn(&mut Box<dyn DriverPort>) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_millis(HOMING_WAIT_TIMEOUT_MS);
        loop {
            if cond(&mut self.port) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(HOMING_WAIT_POLL_MS));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::port::MemoryPort;
    use stage_common::tokens::DEFAULT_MOTOR_PARAMS;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Port double that records every field write in order.
    struct TracingPort {
        inner: MemoryPort,
        writes: Rc<RefCell<Vec<(Field, i32)>>>,
    }

    impl DriverPort for TracingPort {
        fn read_field(&mut self, field: Field) -> i32 {
            self.inner.read_field(field)
        }
        fn write_field(&mut self, field: Field, value: i32) {
            self.writes.borrow_mut().push((field, value));
            self.inner.write_field(field, value);
        }
        fn read_register(&mut self, addr: u8) -> i32 {
            self.inner.read_register(addr)
        }
        fn write_register(&mut self, addr: u8, value: i32) {
            self.inner.write_register(addr, value);
        }
    }

    fn homing_params() -> MotorParams {
        let mut p = DEFAULT_MOTOR_PARAMS;
        p[motor::HMOD] = 1;
        p[motor::HDIR] = 1;
        p[motor::HVEL] = 100;
        p[motor::RMXV] = 1000;
        p[motor::RSEV] = 500;
        p[motor::SREN] = 1;
        p[motor::MTOF] = 3;
        p
    }

    fn backend() -> (HwBackend, MemoryPort) {
        let port = MemoryPort::new();
        (HwBackend::new(Box::new(port.clone())), port)
    }

    // ── Homing start ──

    #[test]
    fn start_homing_arms_latch_and_opens_limit() {
        let (mut hw, port) = backend();
        let p = homing_params();
        hw.configure(&p);
        assert!(matches!(hw.start_homing(&p), Ok(HomingStart::Started)));
        assert_eq!(port.field(Field::VirtualStopRightEnable), 0);
        assert_eq!(port.field(Field::LatchRightArm), 1);
        assert_eq!(port.field(Field::RampMode), ramp_mode::VELOCITY_POS);
        assert_eq!(port.field(Field::MaxVelocity), 100);
    }

    #[test]
    fn start_homing_refuses_bad_configuration() {
        let (mut hw, _port) = backend();
        let mut p = homing_params();
        p[motor::HMOD] = 0;
        assert!(hw.start_homing(&p).is_err());

        let mut p = homing_params();
        p[motor::HDIR] = 2;
        assert!(hw.start_homing(&p).is_err());

        let mut p = homing_params();
        p[motor::SREN] = 0; // commanded side switch disabled
        assert!(hw.start_homing(&p).is_err());

        let mut p = homing_params();
        p[motor::HVEL] = 2000; // above RMXV
        assert!(hw.start_homing(&p).is_err());
    }

    // ── Homing finalization ──

    #[test]
    fn end_homing_rewrites_origin_and_restores_limits() {
        let (mut hw, port) = backend();
        let p = homing_params();
        hw.configure(&p);
        hw.start_homing(&p).unwrap();

        // Latch fires at 300 while the axis sits at 340.
        port.force_field(Field::ActualPosition, 340);
        port.force_field(Field::LatchPosition, 300);
        port.raise_field(Field::RampStatus, ramp::STATUS_LATCH_R);

        let outcome = hw.check_status(true, &p).unwrap();
        assert!(matches!(outcome, MotionStatus::HomingFinalized));
        // Moved back to the new origin.
        assert_eq!(port.field(Field::ActualPosition), 0);
        assert_eq!(port.field(Field::TargetPosition), 0);
        // Limits and latch arming restored.
        assert_eq!(port.field(Field::VirtualStopRightEnable), p[motor::LREN]);
        assert_eq!(port.field(Field::LatchRightArm), 0);
        assert_eq!(port.field(Field::RampStatus) & ramp::STATUS_LATCH_R, 0);
        // Output stage back on.
        assert_eq!(port.field(Field::ChopperOffTime), p[motor::MTOF]);
    }

    #[test]
    fn encoder_origin_comes_from_the_step_counter() {
        let port = MemoryPort::new();
        let writes = Rc::new(RefCell::new(Vec::new()));
        let mut hw = HwBackend::new(Box::new(TracingPort {
            inner: port.clone(),
            writes: Rc::clone(&writes),
        }));
        let mut p = homing_params();
        p[motor::ECON] = 400;
        hw.configure(&p);
        hw.start_homing(&p).unwrap();

        // Encoder and step counter have drifted apart by the time the
        // latch fires.
        port.force_field(Field::ActualPosition, 340);
        port.force_field(Field::EncoderPosition, 352);
        port.force_field(Field::LatchPosition, 300);
        port.raise_field(Field::RampStatus, ramp::STATUS_LATCH_R);
        writes.borrow_mut().clear();

        let outcome = hw.check_status(true, &p).unwrap();
        assert!(matches!(outcome, MotionStatus::HomingFinalized));
        // First rewrite matches the step counter (340 − 300), the drifted
        // encoder reading never enters the new origin; the return to 0
        // then zeroes the counter.
        let enc_writes: Vec<i32> = writes
            .borrow()
            .iter()
            .filter(|(f, _)| *f == Field::EncoderPosition)
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(enc_writes, vec![40, 0]);
    }

    #[test]
    fn cancel_homing_restores_without_position_rewrite() {
        let (mut hw, port) = backend();
        let p = homing_params();
        hw.configure(&p);
        hw.start_homing(&p).unwrap();
        port.force_field(Field::ActualPosition, 250);

        hw.cancel_homing(&p);
        assert_eq!(port.field(Field::ActualPosition), 250);
        assert_eq!(port.field(Field::LatchRightArm), 0);
        assert_eq!(port.field(Field::VirtualStopRightEnable), p[motor::LREN]);
    }

    // ── Faults ──

    #[test]
    fn fault_classification_disables_first() {
        let (mut hw, port) = backend();
        let p = homing_params();
        hw.configure(&p);
        hw.set_enable(true, &p);

        port.raise_field(Field::GlobalFaults, gstat::DRIVER_ERROR);
        port.raise_field(Field::DriveFaults, drv::STALLED);
        assert_eq!(hw.check_error(&p), Err(Fault::Stall));
        assert_eq!(port.field(Field::ChopperOffTime), 0);
        assert_eq!(port.field(Field::MaxVelocity), 0);
        // Fault bits consumed.
        assert_eq!(hw.check_error(&p), Ok(()));
    }

    #[test]
    fn hard_limit_stop_is_a_fault_virtual_is_not() {
        let (mut hw, port) = backend();
        let mut p = homing_params();
        hw.configure(&p);

        port.raise_field(Field::RampStatus, ramp::EVENT_STOP_R);
        assert_eq!(hw.check_status(false, &p), Err(Fault::HardLimit(Side::Right)));

        p[motor::SREN] = 0;
        port.raise_field(Field::RampStatus, ramp::EVENT_STOP_R);
        assert!(hw.check_status(false, &p).is_ok());
    }
}
