//! Hardware configuration enums shared across the workspace.

use crate::consts::MAX_AXES;
use serde::{Deserialize, Serialize};

/// Backend driving an axis. `None` marks the axis unpopulated; motion
/// commands against it are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DriverKind {
    /// Axis not populated.
    #[default]
    None = 0,
    /// Software-simulated backend.
    Simulated = 1,
    /// Physical stepper-driver backend.
    Hardware = 2,
}

impl DriverKind {
    /// Wire/storage representation.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parse the wire/storage representation.
    pub const fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(DriverKind::None),
            1 => Some(DriverKind::Simulated),
            2 => Some(DriverKind::Hardware),
            _ => None,
        }
    }
}

/// Logical role of an axis within the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AxisRole {
    /// Role not assigned.
    #[default]
    Undefined = 0,
    /// Horizontal X axis.
    X = 1,
    /// Horizontal Y axis.
    Y = 2,
    /// Vertical Z axis.
    Z = 3,
    /// Auxiliary axis.
    Aux = 4,
}

impl AxisRole {
    /// Wire/storage representation.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parse the wire/storage representation.
    pub const fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(AxisRole::Undefined),
            1 => Some(AxisRole::X),
            2 => Some(AxisRole::Y),
            3 => Some(AxisRole::Z),
            4 => Some(AxisRole::Aux),
            _ => None,
        }
    }
}

/// How the parameter store is (re)initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureMode {
    /// Reset everything to compiled defaults.
    Defaults,
    /// Keep the current tables (re-apply configuration to the drivers).
    ReloadCurrent,
    /// Read the persisted block; fail safe on version mismatch.
    LoadPersisted,
}

/// Compiled default hardware population.
pub const DEFAULT_DRIVER_KINDS: [DriverKind; MAX_AXES] = [
    DriverKind::Simulated,
    DriverKind::Simulated,
    DriverKind::None,
    DriverKind::None,
];

/// Compiled default axis roles.
pub const DEFAULT_AXIS_ROLES: [AxisRole; MAX_AXES] =
    [AxisRole::X, AxisRole::Y, AxisRole::Z, AxisRole::Aux];
