//! Named driver-chip capability fields and status bit masks.
//!
//! The motion core never addresses chip registers directly; it reads and
//! writes named fields through the [`DriverPort`](super::port::DriverPort)
//! trait. How a field maps onto the register file of a concrete driver
//! chip is the port implementation's concern.

/// Capability fields of a stepper-driver backend.
///
/// Status fields (`GlobalFaults`, `DriveFaults`, `RampStatus`,
/// `EncoderStatus`) are packed bit sets; writing them clears the written
/// bits (write-1-to-clear).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Global current scaler.
    GlobalScaler,
    /// Current sense range.
    CurrentRange,
    /// Run current.
    RunCurrent,
    /// Hold current.
    HoldCurrent,
    /// Microstep resolution.
    MicrostepResolution,
    /// Invert motor shaft direction.
    InvertShaft,
    /// Chopper off time; 0 switches the output stage off.
    ChopperOffTime,
    /// StallGuard stop enable.
    StallGuardEnable,
    /// StallGuard threshold.
    StallGuardThreshold,
    /// CoolStep velocity threshold.
    CoolStepThreshold,
    /// Soft-stop (decelerate instead of hard stop) enable.
    SoftStopEnable,
    /// Left limit-switch enable.
    StopLeftEnable,
    /// Right limit-switch enable.
    StopRightEnable,
    /// Left limit-switch polarity.
    StopLeftPolarity,
    /// Right limit-switch polarity.
    StopRightPolarity,
    /// Swap left/right limit switches.
    SwapStops,
    /// Left virtual (soft) limit enable.
    VirtualStopLeftEnable,
    /// Right virtual (soft) limit enable.
    VirtualStopRightEnable,
    /// Left virtual limit position.
    VirtualStopLeft,
    /// Right virtual limit position.
    VirtualStopRight,
    /// Virtual limits act on encoder position instead of step counter.
    VirtualStopEncoderSelect,
    /// Encoder constant (steps per encoder count); 0 = no encoder.
    EncoderConstant,
    /// Encoder deviation warning threshold.
    EncoderDeviationLimit,
    /// Ramp start velocity.
    StartVelocity,
    /// Ramp maximum velocity (also the velocity-mode setpoint).
    MaxVelocity,
    /// Ramp maximum acceleration.
    MaxAcceleration,
    /// Ramp maximum deceleration.
    MaxDeceleration,
    /// Ramp mode, see [`ramp_mode`].
    RampMode,
    /// Actual position counter.
    ActualPosition,
    /// Target position.
    TargetPosition,
    /// Encoder position counter.
    EncoderPosition,
    /// Position captured when the armed latch trigger fired.
    LatchPosition,
    /// Arm the left-side position latch.
    LatchLeftArm,
    /// Arm the right-side position latch.
    LatchRightArm,
    /// Index-channel edge selection for index homing, 0..=3.
    IndexEventConfig,
    /// Overtemperature pre-warning threshold.
    OvertempWarnThreshold,
    /// Die temperature reading.
    AdcTemperature,
    /// Global fault bits, see [`gstat`].
    GlobalFaults,
    /// Drive fault bits, see [`drv`].
    DriveFaults,
    /// Ramp status/event bits, see [`ramp`].
    RampStatus,
    /// Encoder status bits, see [`enc`].
    EncoderStatus,
}

/// Number of [`Field`] variants (port implementations may use it to size
/// their backing store).
pub const FIELD_COUNT: usize = Field::EncoderStatus as usize + 1;

/// `RampMode` field values.
pub mod ramp_mode {
    /// Target-position ramp.
    pub const POSITION: i32 = 0;
    /// Constant velocity, positive direction.
    pub const VELOCITY_POS: i32 = 1;
    /// Constant velocity, negative direction.
    pub const VELOCITY_NEG: i32 = 2;
    /// Hold current position.
    pub const HOLD: i32 = 3;
}

/// `GlobalFaults` bits.
pub mod gstat {
    /// Chip was reset.
    pub const RESET: i32 = 1 << 0;
    /// A drive fault is pending, details in `DriveFaults`.
    pub const DRIVER_ERROR: i32 = 1 << 1;
    /// Charge-pump undervoltage.
    pub const UNDERVOLTAGE: i32 = 1 << 2;
    /// Register contents lost.
    pub const REGISTER_RESET: i32 = 1 << 3;
}

/// `DriveFaults` bits.
pub mod drv {
    /// Overtemperature pre-warning.
    pub const OVERTEMP_WARN: i32 = 1 << 0;
    /// Overtemperature shutdown.
    pub const OVERTEMP: i32 = 1 << 1;
    /// Short to ground, coil A.
    pub const SHORT_GND_A: i32 = 1 << 2;
    /// Short to ground, coil B.
    pub const SHORT_GND_B: i32 = 1 << 3;
    /// Short to supply, coil A.
    pub const SHORT_SUPPLY_A: i32 = 1 << 4;
    /// Short to supply, coil B.
    pub const SHORT_SUPPLY_B: i32 = 1 << 5;
    /// Open load, coil A.
    pub const OPEN_LOAD_A: i32 = 1 << 6;
    /// Open load, coil B.
    pub const OPEN_LOAD_B: i32 = 1 << 7;
    /// StallGuard stall condition.
    pub const STALLED: i32 = 1 << 8;
    /// Motor is at standstill.
    pub const STANDSTILL: i32 = 1 << 9;
}

/// `RampStatus` bits. Event bits are sticky until cleared.
pub mod ramp {
    /// Left limit switch currently active.
    pub const STATUS_STOP_L: i32 = 1 << 0;
    /// Right limit switch currently active.
    pub const STATUS_STOP_R: i32 = 1 << 1;
    /// Left latch captured a position.
    pub const STATUS_LATCH_L: i32 = 1 << 2;
    /// Right latch captured a position.
    pub const STATUS_LATCH_R: i32 = 1 << 3;
    /// Motion stopped by the left switch (event).
    pub const EVENT_STOP_L: i32 = 1 << 4;
    /// Motion stopped by the right switch (event).
    pub const EVENT_STOP_R: i32 = 1 << 5;
    /// Motion stopped by StallGuard (event).
    pub const EVENT_STOP_SG: i32 = 1 << 6;
    /// Target position reached (event).
    pub const EVENT_POS_REACHED: i32 = 1 << 7;
    /// Set velocity reached.
    pub const VELOCITY_REACHED: i32 = 1 << 8;
    /// Target position currently reached.
    pub const POSITION_REACHED: i32 = 1 << 9;
    /// Actual velocity is zero.
    pub const VELOCITY_ZERO: i32 = 1 << 10;
    /// Left virtual limit currently active.
    pub const STATUS_VSTOP_L: i32 = 1 << 11;
    /// Right virtual limit currently active.
    pub const STATUS_VSTOP_R: i32 = 1 << 12;
    /// StallGuard threshold currently exceeded.
    pub const STATUS_SG: i32 = 1 << 13;

    /// All event bits, for bulk clearing.
    pub const ALL_EVENTS: i32 = STATUS_LATCH_L
        | STATUS_LATCH_R
        | EVENT_STOP_L
        | EVENT_STOP_R
        | EVENT_STOP_SG
        | EVENT_POS_REACHED;
}

/// `EncoderStatus` bits.
pub mod enc {
    /// Encoder deviation exceeded `EncoderDeviationLimit`.
    pub const DEVIATION: i32 = 1 << 0;
    /// Index channel event captured.
    pub const INDEX_EVENT: i32 = 1 << 1;
}
