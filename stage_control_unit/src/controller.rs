//! Component wiring and per-task entry points.
//!
//! The controller owns every subsystem plus the two link ports and exposes
//! one method per cooperative task. Link I/O errors never stop the cycle;
//! they are logged and the task retries on its next slot.

use stage_common::consts::MAX_AXES;
use stage_common::types::ConfigureMode;
use tracing::{info, warn};

use crate::link::LinkPort;
use crate::motion::MotionSupervisor;
use crate::params::ParameterStore;
use crate::remote::RemoteLink;
use crate::serial::CommandDispatcher;

/// Fully wired control unit.
pub struct Controller {
    params: ParameterStore,
    motion: MotionSupervisor,
    dispatcher: CommandDispatcher,
    remote: RemoteLink,
    host_port: Box<dyn LinkPort>,
    remote_port: Box<dyn LinkPort>,
}

impl Controller {
    /// Wire the subsystems to their link ports.
    pub fn new(
        params: ParameterStore,
        motion: MotionSupervisor,
        host_port: Box<dyn LinkPort>,
        remote_port: Box<dyn LinkPort>,
    ) -> Self {
        Self {
            params,
            motion,
            dispatcher: CommandDispatcher::new(),
            remote: RemoteLink::new(),
            host_port,
            remote_port,
        }
    }

    /// Load the parameter tables per `mode` and configure every axis from
    /// them. A per-axis failure is logged and leaves that axis without a
    /// driver; the rest still come up.
    pub fn startup(&mut self, mode: ConfigureMode) {
        self.params.configure(mode);
        for axis in 0..MAX_AXES as i32 {
            if !self.params.is_active(axis, false) {
                continue;
            }
            if self.motion.configure_axis(axis, &mut self.params).is_err() {
                warn!(axis, "axis failed to configure at startup");
            }
        }
        info!("controller started");
    }

    // ─── Task Bodies ────────────────────────────────────────────────

    /// Host command poll.
    pub fn serial_task(&mut self) {
        if let Err(e) = self.dispatcher.poll(
            self.host_port.as_mut(),
            self.remote_port.as_mut(),
            &mut self.params,
            &mut self.motion,
            &mut self.remote,
        ) {
            warn!("host link I/O error: {e}");
        }
    }

    /// Remote-unit inbound poll.
    pub fn remote_rx_task(&mut self) {
        if let Err(e) = self.remote.poll(
            self.remote_port.as_mut(),
            &mut self.params,
            &mut self.motion,
        ) {
            warn!("remote link I/O error: {e}");
        }
    }

    /// Remote-unit position broadcast.
    pub fn remote_send_task(&mut self) {
        if let Err(e) = self.remote.broadcast(
            self.remote_port.as_mut(),
            &mut self.params,
            &mut self.motion,
        ) {
            warn!("remote link I/O error: {e}");
        }
    }

    /// Driver fault poll.
    pub fn fault_task(&mut self) {
        self.motion.poll_faults(&mut self.params);
    }

    /// Motion progress poll: homing finalization and closed-loop steps.
    pub fn motion_task(&mut self) {
        self.motion.poll_motion(&mut self.params);
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// Parameter store handle.
    pub fn params_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    /// Motion supervisor handle.
    pub fn motion_mut(&mut self) -> &mut MotionSupervisor {
        &mut self.motion
    }

    /// Host link port handle.
    pub fn host_port_mut(&mut self) -> &mut dyn LinkPort {
        self.host_port.as_mut()
    }

    /// Remote link port handle.
    pub fn remote_port_mut(&mut self) -> &mut dyn LinkPort {
        self.remote_port.as_mut()
    }
}
