//! Host command dispatcher for the primary link.
//!
//! Commands are newline-terminated ASCII lines of the shape
//! `<S|G><CATEGORY><TOKEN><axis>[,value[,value]]` plus a handful of
//! fixed admin commands. Every set replies `ERROR=<code>`; every get
//! replies `<CATEGORY><TOKEN><axis>=<value>` or `ERROR=<code>` on
//! failure. Unknown tokens inside a known category are parameter
//! errors; anything that does not parse at all is a link error.

use std::io;

use stage_common::consts::{IDENTITY_BANNER, MAX_AXES, STORE_VERSION};
use stage_common::error::{wire_code, CmdResult, ErrorLatch, Subsystem};
use stage_common::tokens::{
    motor_param_index, remote_param_index, status_index, status_is_read_only,
};

use crate::link::LinkPort;
use crate::motion::MotionSupervisor;
use crate::params::ParameterStore;
use crate::remote::RemoteLink;

/// One parsed axis command.
struct Request<'a> {
    set: bool,
    category: &'a str,
    token: &'a str,
    axis: i32,
    values: Vec<i32>,
}

/// Split a line into its fixed-position fields. `None` means the shape
/// itself is unrecognized.
fn parse_shape(line: &str) -> Option<Request<'_>> {
    if line.len() < 9 || !line.is_ascii() {
        return None;
    }
    let set = match &line[..1] {
        "S" => true,
        "G" => false,
        _ => return None,
    };
    let category = &line[1..4];
    if !matches!(category, "MC_" | "MS_" | "MP_" | "RP_") {
        return None;
    }
    let token = &line[4..8];
    let mut parts = line[8..].split(',');
    let axis: i32 = parts.next()?.trim().parse().ok()?;
    let mut values = Vec::new();
    for part in parts {
        values.push(part.trim().parse().ok()?);
    }
    Some(Request {
        set,
        category,
        token,
        axis,
        values,
    })
}

fn code_reply(res: CmdResult) -> String {
    format!("ERROR={}", wire_code(&res))
}

fn value_reply(category: &str, token: &str, axis: i32, value: Result<i32, Subsystem>) -> String {
    match value {
        Ok(v) => format!("{category}{token}{axis}={v}"),
        Err(sub) => format!("ERROR={}", sub.code()),
    }
}

/// Line-oriented command dispatcher with its own link error latch.
pub struct CommandDispatcher {
    latch: ErrorLatch,
    rx: Vec<u8>,
}

impl CommandDispatcher {
    /// Create an idle dispatcher.
    pub fn new() -> Self {
        Self {
            latch: ErrorLatch::new(),
            rx: Vec::new(),
        }
    }

    /// Accumulate inbound bytes and answer every complete line.
    #[allow(clippy::too_many_arguments)]
    pub fn poll(
        &mut self,
        port: &mut dyn LinkPort,
        remote_port: &mut dyn LinkPort,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
        remote: &mut RemoteLink,
    ) -> io::Result<()> {
        port.poll(&mut self.rx)?;
        while let Some(nl) = self.rx.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.rx.drain(..=nl).collect();
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }
            let reply = self.dispatch_line(line, remote_port, params, motion, remote);
            port.send(reply.as_bytes())?;
            port.send(b"\n")?;
        }
        Ok(())
    }

    /// Dispatch one complete command line and produce its reply.
    pub fn dispatch_line(
        &mut self,
        line: &str,
        remote_port: &mut dyn LinkPort,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
        remote: &mut RemoteLink,
    ) -> String {
        match line {
            "*IDN?" => return IDENTITY_BANNER.to_string(),
            "GPC_NDEV" => return format!("PC_NDEV={MAX_AXES}"),
            "GPC_VERS" => return format!("PC_VERS={STORE_VERSION}"),
            "GPC_EMSG" => return self.error_report(params, motion, remote),
            "SPC_SAFL" => return code_reply(params.save()),
            _ => {}
        }
        let Some(req) = parse_shape(line) else {
            self.latch.latch("Unrecognized command");
            return code_reply(Err(Subsystem::Link));
        };
        match req.category {
            "MC_" => self.motor_command(&req, remote_port, params, motion, remote),
            "MS_" => self.motor_status(&req, params, motion),
            "MP_" => self.motor_param(&req, params),
            "RP_" => self.remote_param(&req, remote_port, params, motion, remote),
            _ => unreachable!(),
        }
    }

    // ─── Category Handlers ──────────────────────────────────────────

    fn motor_command(
        &mut self,
        req: &Request<'_>,
        remote_port: &mut dyn LinkPort,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
        remote: &mut RemoteLink,
    ) -> String {
        if req.set {
            let res = match req.token {
                "MPOS" => self.check_host_owned(req.axis, motion).and_then(|_| {
                    let pos = self.require_value(req, 0)?;
                    motion.move_to_position(req.axis, pos, true, params)
                }),
                "MVEL" => self.check_host_owned(req.axis, motion).and_then(|_| {
                    let v = self.require_value(req, 0)?;
                    motion.move_at_velocity(req.axis, v, params)
                }),
                "HOME" => self
                    .check_host_owned(req.axis, motion)
                    .and_then(|_| motion.start_homing(req.axis, params)),
                "CONF" => motion
                    .configure_axis(req.axis, params)
                    .and_then(|_| remote.push_params(remote_port, req.axis, params, motion)),
                "SCLR" => motion.clear_status(req.axis, params),
                "DREG" => {
                    let addr = self.require_value(req, 0);
                    let value = self.require_value(req, 1);
                    addr.and_then(|a| value.and_then(|v| motion.write_register(req.axis, a as u8, v, params)))
                }
                _ => {
                    params.latch_error("Unknown command token");
                    Err(Subsystem::Parameter)
                }
            };
            return code_reply(res);
        }
        match req.token {
            "STAT" => value_reply(
                "MC_",
                "STAT",
                req.axis,
                motion.status_flags(req.axis, params).map(|v| v as i32),
            ),
            "POSR" => value_reply(
                "MC_",
                "POSR",
                req.axis,
                motion.is_motion_done(req.axis, params).map(i32::from),
            ),
            "DREG" => {
                let value = self
                    .require_value(req, 0)
                    .and_then(|addr| motion.read_register(req.axis, addr as u8, params));
                value_reply("MC_", "DREG", req.axis, value)
            }
            _ => {
                params.latch_error("Unknown command token");
                code_reply(Err(Subsystem::Parameter))
            }
        }
    }

    fn motor_status(
        &mut self,
        req: &Request<'_>,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
    ) -> String {
        let Some(index) = status_index(req.token) else {
            params.latch_error("Unknown command token");
            return code_reply(Err(Subsystem::Parameter));
        };
        if req.set {
            if status_is_read_only(index) {
                params.latch_error("Status value is read-only");
                return code_reply(Err(Subsystem::Parameter));
            }
            let res = self
                .require_value(req, 0)
                .and_then(|v| motion.set_status_value(req.axis, index, v, params));
            return code_reply(res);
        }
        value_reply(
            "MS_",
            req.token,
            req.axis,
            motion.status_value(req.axis, index, params),
        )
    }

    fn motor_param(&mut self, req: &Request<'_>, params: &mut ParameterStore) -> String {
        match req.token {
            "TDEV" => {
                if req.set {
                    let res = self
                        .require_value(req, 0)
                        .and_then(|v| params.set_device_kind(req.axis, v));
                    code_reply(res)
                } else {
                    value_reply("MP_", "TDEV", req.axis, params.device_kind_value(req.axis))
                }
            }
            "TAXI" => {
                if req.set {
                    let res = self
                        .require_value(req, 0)
                        .and_then(|v| params.set_role(req.axis, v));
                    code_reply(res)
                } else {
                    value_reply("MP_", "TAXI", req.axis, params.role_value(req.axis))
                }
            }
            token => {
                let Some(index) = motor_param_index(token) else {
                    params.latch_error("Unknown command token");
                    return code_reply(Err(Subsystem::Parameter));
                };
                if req.set {
                    let res = self
                        .require_value(req, 0)
                        .and_then(|v| params.set_motor_param(req.axis, index, v));
                    code_reply(res)
                } else {
                    value_reply("MP_", token, req.axis, params.motor_param(req.axis, index))
                }
            }
        }
    }

    /// Remote parameters persist locally and, on set, are forwarded to the
    /// remote unit. The forward validates first so a rejected value never
    /// reaches the table.
    fn remote_param(
        &mut self,
        req: &Request<'_>,
        remote_port: &mut dyn LinkPort,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
        remote: &mut RemoteLink,
    ) -> String {
        let Some(index) = remote_param_index(req.token) else {
            params.latch_error("Unknown command token");
            return code_reply(Err(Subsystem::Parameter));
        };
        if req.set {
            let res = self.require_value(req, 0).and_then(|v| {
                remote.send_command(remote_port, index, req.axis, v, params, motion)?;
                params.set_remote_param(req.axis, index, v)
            });
            return code_reply(res);
        }
        value_reply("RP_", req.token, req.axis, params.remote_param(req.axis, index))
    }

    // ─── Helpers ────────────────────────────────────────────────────

    fn require_value(&mut self, req: &Request<'_>, index: usize) -> Result<i32, Subsystem> {
        match req.values.get(index) {
            Some(v) => Ok(*v),
            None => {
                self.latch.latch("Malformed command");
                Err(Subsystem::Link)
            }
        }
    }

    /// Motion requests from the host are refused while the axis is owned
    /// by the remote unit.
    fn check_host_owned(&mut self, axis: i32, motion: &MotionSupervisor) -> CmdResult {
        if motion.is_remote_controlled(axis) {
            self.latch.latch("Motor is under remote control");
            return Err(Subsystem::Link);
        }
        Ok(())
    }

    /// Concatenate and clear every pending subsystem message.
    fn error_report(
        &mut self,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
        remote: &mut RemoteLink,
    ) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(m) = self.latch.take() {
            parts.push(format!("{}: {}", Subsystem::Link.label(), m));
        }
        if let Some(m) = motion.take_motion_error() {
            parts.push(format!("{}: {}", Subsystem::Motion.label(), m));
        }
        if let Some(m) = motion.take_driver_error() {
            parts.push(format!("{}: {}", Subsystem::Driver.label(), m));
        }
        if let Some(m) = params.take_error() {
            parts.push(format!("{}: {}", Subsystem::Parameter.label(), m));
        }
        if let Some(m) = remote.take_error() {
            parts.push(format!("{}: {}", Subsystem::Remote.label(), m));
        }
        if parts.is_empty() {
            "PC_EMSG=No error".to_string()
        } else {
            format!("PC_EMSG={}", parts.join("; "))
        }
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
