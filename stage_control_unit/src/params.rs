//! Hardware configuration and parameter tables with persistence.
//!
//! The store holds the per-axis driver kind and role plus two fixed tables:
//! 34 motor parameters and 5 remote-unit parameters per axis. Values are
//! not range-checked here (consumers own their ranges); only axis bounds
//! and enum ranges are enforced. The whole store persists as one versioned
//! binary block; a version mismatch on load forces every driver kind to
//! `None` so that no axis ever runs an undefined configuration.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stage_common::consts::{MAX_AXES, MOTOR_PARAM_COUNT, REMOTE_PARAM_COUNT, STORE_VERSION};
use stage_common::error::{CmdResult, ErrorLatch, LatchMessage, Subsystem};
use stage_common::tokens::{remote, DEFAULT_MOTOR_PARAMS, DEFAULT_REMOTE_PARAMS};
use stage_common::types::{
    AxisRole, ConfigureMode, DriverKind, DEFAULT_AXIS_ROLES, DEFAULT_DRIVER_KINDS,
};
use thiserror::Error;
use tracing::{info, warn};

/// One row of the motor-parameter table.
pub type MotorParams = [i32; MOTOR_PARAM_COUNT];

/// Persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Binary encoding/decoding failed.
    #[error("store encoding failed: {0}")]
    Codec(#[from] bincode::Error),
}

/// Persisted block layout: one contiguous versioned region.
#[derive(Debug, Serialize, Deserialize)]
struct StoreBlock {
    version: i32,
    kinds: [i32; MAX_AXES],
    roles: [i32; MAX_AXES],
    #[serde(with = "motor_table")]
    motor: [MotorParams; MAX_AXES],
    remote: [[i32; REMOTE_PARAM_COUNT]; MAX_AXES],
}

/// serde has no array impls past 32 elements; the 34-token motor rows
/// cross the persisted block as one flat sequence.
mod motor_table {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{MotorParams, MAX_AXES, MOTOR_PARAM_COUNT};

    pub fn serialize<S: Serializer>(
        table: &[MotorParams; MAX_AXES],
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        let flat: Vec<i32> = table.iter().flat_map(|row| row.iter().copied()).collect();
        flat.serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<[MotorParams; MAX_AXES], D::Error> {
        let flat = Vec::<i32>::deserialize(de)?;
        if flat.len() != MAX_AXES * MOTOR_PARAM_COUNT {
            return Err(D::Error::invalid_length(
                flat.len(),
                &"one row of motor parameters per axis",
            ));
        }
        let mut table = [[0; MOTOR_PARAM_COUNT]; MAX_AXES];
        for (row, chunk) in table.iter_mut().zip(flat.chunks_exact(MOTOR_PARAM_COUNT)) {
            row.copy_from_slice(chunk);
        }
        Ok(table)
    }
}

/// Hardware configuration plus both parameter tables.
pub struct ParameterStore {
    kinds: [DriverKind; MAX_AXES],
    roles: [AxisRole; MAX_AXES],
    motor: [MotorParams; MAX_AXES],
    remote: [[i32; REMOTE_PARAM_COUNT]; MAX_AXES],
    store_path: PathBuf,
    latch: ErrorLatch,
}

impl ParameterStore {
    /// Create a store holding compiled defaults, persisting to `store_path`.
    pub fn new(store_path: PathBuf) -> Self {
        Self {
            kinds: DEFAULT_DRIVER_KINDS,
            roles: DEFAULT_AXIS_ROLES,
            motor: [DEFAULT_MOTOR_PARAMS; MAX_AXES],
            remote: [DEFAULT_REMOTE_PARAMS; MAX_AXES],
            store_path,
            latch: ErrorLatch::new(),
        }
    }

    /// (Re)initialize the tables according to `mode`.
    pub fn configure(&mut self, mode: ConfigureMode) {
        match mode {
            ConfigureMode::Defaults => self.apply_defaults(),
            ConfigureMode::ReloadCurrent => {}
            ConfigureMode::LoadPersisted => self.load(),
        }
    }

    fn apply_defaults(&mut self) {
        self.kinds = DEFAULT_DRIVER_KINDS;
        self.roles = DEFAULT_AXIS_ROLES;
        self.motor = [DEFAULT_MOTOR_PARAMS; MAX_AXES];
        self.remote = [DEFAULT_REMOTE_PARAMS; MAX_AXES];
    }

    // ─── Axis Checks ────────────────────────────────────────────────

    /// Whether `axis` is a valid index. Latches a parameter error when
    /// `raise` is set and the index is out of bounds.
    pub fn is_valid_axis(&mut self, axis: i32, raise: bool) -> bool {
        let valid = (0..MAX_AXES as i32).contains(&axis);
        if !valid && raise {
            self.latch.latch("Invalid axis index");
        }
        valid
    }

    /// Whether `axis` is valid and populated with a driver.
    pub fn is_active(&mut self, axis: i32, raise: bool) -> bool {
        if !self.is_valid_axis(axis, raise) {
            return false;
        }
        let active = self.kinds[axis as usize] != DriverKind::None;
        if !active && raise {
            self.latch.latch("Axis is not active");
        }
        active
    }

    // ─── Hardware Fields ────────────────────────────────────────────

    /// Driver kind of a validated axis.
    pub fn driver_kind(&self, axis: usize) -> DriverKind {
        self.kinds[axis]
    }

    /// Wire read of the driver kind.
    pub fn device_kind_value(&mut self, axis: i32) -> Result<i32, Subsystem> {
        if !self.is_valid_axis(axis, true) {
            return Err(Subsystem::Parameter);
        }
        Ok(self.kinds[axis as usize].as_i32())
    }

    /// Wire write of the driver kind.
    pub fn set_device_kind(&mut self, axis: i32, value: i32) -> CmdResult {
        if !self.is_valid_axis(axis, true) {
            return Err(Subsystem::Parameter);
        }
        match DriverKind::from_i32(value) {
            Some(kind) => {
                self.kinds[axis as usize] = kind;
                Ok(())
            }
            None => {
                self.latch.latch("Unknown device type");
                Err(Subsystem::Parameter)
            }
        }
    }

    /// Wire read of the axis role.
    pub fn role_value(&mut self, axis: i32) -> Result<i32, Subsystem> {
        if !self.is_valid_axis(axis, true) {
            return Err(Subsystem::Parameter);
        }
        Ok(self.roles[axis as usize].as_i32())
    }

    /// Wire write of the axis role.
    pub fn set_role(&mut self, axis: i32, value: i32) -> CmdResult {
        if !self.is_valid_axis(axis, true) {
            return Err(Subsystem::Parameter);
        }
        match AxisRole::from_i32(value) {
            Some(role) => {
                self.roles[axis as usize] = role;
                Ok(())
            }
            None => {
                self.latch.latch("Unknown axis role");
                Err(Subsystem::Parameter)
            }
        }
    }

    // ─── Motor Parameters ───────────────────────────────────────────

    /// Full parameter row of a validated axis, for driver configuration.
    pub fn motor_params(&self, axis: usize) -> &MotorParams {
        &self.motor[axis]
    }

    /// Read one motor parameter.
    pub fn motor_param(&mut self, axis: i32, index: usize) -> Result<i32, Subsystem> {
        if !self.is_valid_axis(axis, true) {
            return Err(Subsystem::Parameter);
        }
        Ok(self.motor[axis as usize][index])
    }

    /// Write one motor parameter. No value range check by design; the
    /// consuming subsystem validates on use.
    pub fn set_motor_param(&mut self, axis: i32, index: usize, value: i32) -> CmdResult {
        if !self.is_valid_axis(axis, true) {
            return Err(Subsystem::Parameter);
        }
        self.motor[axis as usize][index] = value;
        Ok(())
    }

    // ─── Remote Parameters ──────────────────────────────────────────

    /// Read one remote parameter.
    pub fn remote_param(&mut self, axis: i32, index: usize) -> Result<i32, Subsystem> {
        if !self.is_valid_axis(axis, true) {
            return Err(Subsystem::Parameter);
        }
        Ok(self.remote[axis as usize][index])
    }

    /// Write one remote parameter. Axis −1 ("all axes") is permitted only
    /// on the remote-enable token.
    pub fn set_remote_param(&mut self, axis: i32, index: usize, value: i32) -> CmdResult {
        if axis == -1 {
            if index != remote::ENAB {
                self.latch.latch("Broadcast write only allowed on ENAB");
                return Err(Subsystem::Parameter);
            }
            for row in self.remote.iter_mut() {
                row[remote::ENAB] = value;
            }
            return Ok(());
        }
        if !self.is_valid_axis(axis, true) {
            return Err(Subsystem::Parameter);
        }
        self.remote[axis as usize][index] = value;
        Ok(())
    }

    // ─── Persistence ────────────────────────────────────────────────

    /// Persist the store as one versioned block.
    pub fn save(&mut self) -> CmdResult {
        match self.write_block() {
            Ok(()) => {
                info!(path = %self.store_path.display(), "parameter store saved");
                Ok(())
            }
            Err(e) => {
                warn!("parameter store save failed: {e}");
                self.latch.latch("Failed to write parameter store");
                Err(Subsystem::Parameter)
            }
        }
    }

    fn write_block(&self) -> Result<(), StoreError> {
        let block = StoreBlock {
            version: STORE_VERSION,
            kinds: self.kinds.map(DriverKind::as_i32),
            roles: self.roles.map(AxisRole::as_i32),
            motor: self.motor,
            remote: self.remote,
        };
        let bytes = bincode::serialize(&block)?;
        let tmp = self.store_path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.store_path)?;
        Ok(())
    }

    /// Load the persisted block. Fail-safe: a version mismatch forces all
    /// driver kinds to `None`; a missing or corrupt file keeps defaults.
    /// Either case latches a parameter error.
    fn load(&mut self) {
        let block: StoreBlock = match fs::read(&self.store_path)
            .map_err(StoreError::from)
            .and_then(|bytes| bincode::deserialize(&bytes).map_err(StoreError::from))
        {
            Ok(block) => block,
            Err(e) => {
                warn!("parameter store load failed: {e}");
                self.latch.latch("Failed to read parameter store");
                self.apply_defaults();
                return;
            }
        };
        if block.version != STORE_VERSION {
            warn!(
                found = block.version,
                expected = STORE_VERSION,
                "parameter store version mismatch"
            );
            self.latch.latch("Version mismatch in parameter store");
            self.kinds = [DriverKind::None; MAX_AXES];
            return;
        }
        for axis in 0..MAX_AXES {
            self.kinds[axis] = DriverKind::from_i32(block.kinds[axis]).unwrap_or_default();
            self.roles[axis] = AxisRole::from_i32(block.roles[axis]).unwrap_or_default();
        }
        self.motor = block.motor;
        self.remote = block.remote;
        info!(path = %self.store_path.display(), "parameter store loaded");
    }

    // ─── Error Latch ────────────────────────────────────────────────

    /// Latch a parameter-subsystem error raised by a caller.
    pub fn latch_error(&mut self, msg: &str) {
        self.latch.latch(msg);
    }

    /// Read and clear the latched parameter error.
    pub fn take_error(&mut self) -> Option<LatchMessage> {
        self.latch.take()
    }
}
