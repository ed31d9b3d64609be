//! Stage Controller Common Library
//!
//! Shared definitions for the stage controller workspace:
//!
//! - [`consts`] - Axis limits, task intervals, protocol constants
//! - [`error`] - Subsystem error codes, latches and fault classification
//! - [`tokens`] - Parameter/status token tables and compiled defaults
//! - [`types`] - Hardware configuration enums

#![deny(warnings)]
#![deny(missing_docs)]

pub mod consts;
pub mod error;
pub mod tokens;
pub mod types;
