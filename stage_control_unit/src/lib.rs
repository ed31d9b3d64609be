//! # Stage Control Unit
//!
//! Firmware core of a multi-axis stepper-motor stage controller. Accepts
//! textual commands over two independent links, translates them into motion
//! and configuration actions on up to four axes, and reports status and
//! faults back.
//!
//! # Module Structure
//!
//! - [`params`] - Hardware configuration and parameter tables, persistence
//! - [`driver`] - Per-axis driver capability surface (simulated / hardware)
//! - [`motion`] - Motion supervisor: runtime state, closed loop, homing
//! - [`serial`] - Primary-link plain-text command dispatcher
//! - [`remote`] - Secondary-link checksum-framed protocol and arbitration
//! - [`link`] - Byte-stream port abstraction for both links
//! - [`controller`] - Component wiring and per-cycle task bodies
//! - [`cycle`] - Cooperative cycle runner with fixed task intervals
//! - [`config`] - Runtime TOML configuration
//!
//! # Architecture
//!
//! ```text
//!  host ──► LinkPort ──► CommandDispatcher ─┐
//!                                           ├─► ParameterStore
//!  remote ─► LinkPort ──► RemoteLink ───────┤
//!                                           └─► MotionSupervisor ─► AxisDriver
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod cycle;
pub mod driver;
pub mod link;
pub mod motion;
pub mod params;
pub mod remote;
pub mod serial;

pub use crate::controller::Controller;
pub use crate::cycle::CycleRunner;
