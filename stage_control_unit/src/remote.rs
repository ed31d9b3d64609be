//! Secondary link to the handheld remote unit.
//!
//! Wire unit is a frame `<payload|checksum>` where the checksum is the
//! 8-bit sum of the raw payload bytes, printed as unsigned decimal. The
//! checksum is verified before any payload command runs; a mismatch
//! discards the whole frame so no partial application is possible. A
//! payload carries `;`-separated commands (`POS`, `VEL`, `ENAB`,
//! `ACCREQ`). The additive checksum is intentionally weak; it guards
//! against single transient corruption, nothing more.

use std::io;

use parking_lot::Mutex;
use stage_common::consts::MAX_AXES;
use stage_common::error::{CmdResult, ErrorLatch, LatchMessage, Subsystem};
use stage_common::tokens::{remote, REMOTE_PARAM_TOKENS};
use tracing::{debug, warn};

use crate::link::LinkPort;
use crate::motion::MotionSupervisor;
use crate::params::ParameterStore;

/// 8-bit additive checksum over the raw payload bytes.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Wrap a payload into a wire frame.
pub fn frame(payload: &str) -> String {
    format!("<{}|{}>", payload, checksum(payload.as_bytes()))
}

/// Secondary-link protocol handler and ownership arbiter.
pub struct RemoteLink {
    latch: ErrorLatch,
    rx: Vec<u8>,
    /// Per axis: a `POS` command was already applied since the last mode
    /// change, so further `POS` updates are incremental retargets.
    repeat_pos_set: [bool; MAX_AXES],
    /// Single in-flight-frame guard for outbound transmission. Spin-wait,
    /// no fairness guarantee.
    tx_guard: Mutex<()>,
}

impl RemoteLink {
    /// Create an idle link handler.
    pub fn new() -> Self {
        Self {
            latch: ErrorLatch::new(),
            rx: Vec::new(),
            repeat_pos_set: [false; MAX_AXES],
            tx_guard: Mutex::new(()),
        }
    }

    // ─── Inbound ────────────────────────────────────────────────────

    /// Accumulate inbound bytes and apply every complete frame.
    pub fn poll(
        &mut self,
        port: &mut dyn LinkPort,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
    ) -> io::Result<()> {
        port.poll(&mut self.rx)?;
        while let Some(end) = self.rx.iter().position(|b| *b == b'>') {
            let raw: Vec<u8> = self.rx.drain(..=end).collect();
            let text = String::from_utf8_lossy(&raw);
            match parse_frame(&text) {
                Some(payload) => {
                    let payload = payload.to_owned();
                    self.apply_payload(&payload, port, params, motion)?;
                }
                None => warn!(frame = %text, "remote frame discarded (bad checksum)"),
            }
        }
        Ok(())
    }

    fn apply_payload(
        &mut self,
        payload: &str,
        port: &mut dyn LinkPort,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
    ) -> io::Result<()> {
        for cmd in payload.split(';').filter(|c| !c.is_empty()) {
            if let Some(rest) = cmd.strip_prefix("ACCREQ") {
                match rest.parse::<i32>() {
                    Ok(axis) => self.handle_access_request(axis, port, params, motion)?,
                    Err(_) => {
                        self.latch.latch("Malformed remote command");
                    }
                }
                continue;
            }
            let Some((token, axis, value)) = parse_command(cmd) else {
                self.latch.latch("Unrecognized remote command");
                continue;
            };
            match token {
                "POS" => self.handle_position(axis, value, params, motion),
                "VEL" => self.handle_velocity(axis, value, params, motion),
                "ENAB" => {
                    let _ = motion.set_remote_controlled(axis, value != 0, params);
                    let _ = params.set_remote_param(axis, remote::ENAB, value);
                    if (0..MAX_AXES as i32).contains(&axis) {
                        self.repeat_pos_set[axis as usize] = false;
                    }
                }
                _ => {
                    self.latch.latch("Unrecognized remote command");
                }
            }
        }
        Ok(())
    }

    /// `POS` retarget. The configured velocity is sent only with the first
    /// command after an ownership change so later updates do not restart
    /// the ramp profile.
    fn handle_position(
        &mut self,
        axis: i32,
        value: i32,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
    ) {
        if !params.is_active(axis, false) || !motion.is_remote_controlled(axis) {
            self.latch.latch("Axis is not under remote control");
            return;
        }
        let a = axis as usize;
        let first = !self.repeat_pos_set[a];
        if motion.move_to_position(axis, value, first, params).is_ok() {
            self.repeat_pos_set[a] = true;
        }
    }

    fn handle_velocity(
        &mut self,
        axis: i32,
        value: i32,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
    ) {
        if !params.is_active(axis, false) || !motion.is_remote_controlled(axis) {
            self.latch.latch("Axis is not under remote control");
            return;
        }
        self.repeat_pos_set[axis as usize] = false;
        let _ = motion.move_at_velocity(axis, value, params);
    }

    /// Access request: take ownership, persist the remote-enable flag and
    /// acknowledge with an `ENAB<axis>=1` frame. The remote resets its
    /// relative-position reference on the acknowledgment.
    fn handle_access_request(
        &mut self,
        axis: i32,
        port: &mut dyn LinkPort,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
    ) -> io::Result<()> {
        if (0..MAX_AXES as i32).contains(&axis) {
            self.repeat_pos_set[axis as usize] = false;
        }
        if self
            .send_command(port, remote::ENAB, axis, 1, params, motion)
            .is_ok()
        {
            let _ = params.set_remote_param(axis, remote::ENAB, 1);
            debug!(axis, "remote took ownership");
        }
        Ok(())
    }

    // ─── Outbound ───────────────────────────────────────────────────

    /// Validate and transmit one command frame to the remote unit. `ENAB`
    /// also updates the supervisor's ownership flags; only `ENAB` accepts
    /// the −1 broadcast axis.
    pub fn send_command(
        &mut self,
        port: &mut dyn LinkPort,
        index: usize,
        axis: i32,
        value: i32,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
    ) -> CmdResult {
        if index != remote::ENAB && !(0..MAX_AXES as i32).contains(&axis) {
            self.latch.latch("Remote command axis out of range");
            return Err(Subsystem::Remote);
        }
        match index {
            remote::ENAB => {
                if !(-1..MAX_AXES as i32).contains(&axis) || !(0..=1).contains(&value) {
                    self.latch.latch("Invalid remote enable request");
                    return Err(Subsystem::Remote);
                }
                motion.set_remote_controlled(axis, value != 0, params)?;
                // The remote unit indexes its channels by the literal axis
                // digit, so an all-axes enable goes out as one frame per
                // active axis.
                if axis == -1 {
                    for a in 0..MAX_AXES as i32 {
                        if params.is_active(a, false) {
                            let payload =
                                format!("{}{}={}", REMOTE_PARAM_TOKENS[index], a, value);
                            self.transmit(port, &payload)?;
                        }
                    }
                    return Ok(());
                }
            }
            remote::JDIR | remote::EDIR => {
                if value.abs() != 1 {
                    self.latch.latch("Invalid remote direction value");
                    return Err(Subsystem::Remote);
                }
            }
            remote::JMAX => {
                let max = params.motor_param(axis, stage_common::tokens::motor::RMXV)?;
                if !(0..=max).contains(&value) {
                    self.latch.latch("Remote joystick velocity out of range");
                    return Err(Subsystem::Remote);
                }
            }
            _ => {}
        }
        let payload = format!("{}{}={}", REMOTE_PARAM_TOKENS[index], axis, value);
        self.transmit(port, &payload)
    }

    /// Push all remote parameters of one axis to the remote unit.
    pub fn push_params(
        &mut self,
        port: &mut dyn LinkPort,
        axis: i32,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
    ) -> CmdResult {
        for index in 0..REMOTE_PARAM_TOKENS.len() {
            let value = params.remote_param(axis, index)?;
            self.send_command(port, index, axis, value, params, motion)?;
        }
        Ok(())
    }

    /// Periodic position broadcast: one `POS<axis>=<value>` entry per
    /// remote-owned axis, skipped entirely when no axis is remote-owned.
    pub fn broadcast(
        &mut self,
        port: &mut dyn LinkPort,
        params: &mut ParameterStore,
        motion: &mut MotionSupervisor,
    ) -> io::Result<()> {
        let mut entries: Vec<String> = Vec::new();
        for a in 0..MAX_AXES {
            if params.is_active(a as i32, false) && motion.is_remote_controlled(a as i32) {
                let pos = motion.driver_mut(a).position();
                entries.push(format!("POS{a}={pos}"));
            }
        }
        if entries.is_empty() {
            return Ok(());
        }
        let payload = entries.join(";");
        match self.transmit(port, &payload) {
            Ok(()) => Ok(()),
            Err(_) => Ok(()), // already latched
        }
    }

    fn transmit(&mut self, port: &mut dyn LinkPort, payload: &str) -> CmdResult {
        let wire = frame(payload);
        // Spin until the in-flight frame (if any) clears.
        loop {
            if let Some(guard) = self.tx_guard.try_lock() {
                let res = port.send(wire.as_bytes());
                drop(guard);
                return match res {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        warn!("remote link write failed: {e}");
                        self.latch.latch("Remote link write failed");
                        Err(Subsystem::Remote)
                    }
                };
            }
            core::hint::spin_loop();
        }
    }

    /// Read and clear the latched remote error.
    pub fn take_error(&mut self) -> Option<LatchMessage> {
        self.latch.take()
    }
}

impl Default for RemoteLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the payload of a complete frame text if its checksum matches.
fn parse_frame(text: &str) -> Option<&str> {
    let start = text.find('<')?;
    let body = text[start + 1..].strip_suffix('>')?;
    let bar = body.rfind('|')?;
    let (payload, sum_text) = (&body[..bar], &body[bar + 1..]);
    let stated: u8 = sum_text.parse().ok()?;
    (checksum(payload.as_bytes()) == stated).then_some(payload)
}

/// Split `TOKEN<axis>=<value>` into its parts.
fn parse_command(cmd: &str) -> Option<(&str, i32, i32)> {
    let eq = cmd.find('=')?;
    let head = &cmd[..eq];
    let value: i32 = cmd[eq + 1..].parse().ok()?;
    let digits = head.find(|c: char| c == '-' || c.is_ascii_digit())?;
    let token = &head[..digits];
    let axis: i32 = head[digits..].parse().ok()?;
    Some((token, axis, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LoopbackPort;
    use stage_common::tokens::motor;
    use std::path::PathBuf;

    fn setup() -> (RemoteLink, LoopbackPort, ParameterStore, MotionSupervisor) {
        let mut params = ParameterStore::new(PathBuf::from("/nonexistent/params.bin"));
        // Populate all four axes as simulated and enable them.
        let mut motion = MotionSupervisor::new();
        for a in 0..MAX_AXES as i32 {
            params.set_device_kind(a, 1).unwrap();
            params.set_motor_param(a, motor::RMXV, 10_000).unwrap();
            params.set_motor_param(a, motor::LLPS, -100_000).unwrap();
            params.set_motor_param(a, motor::LRPS, 100_000).unwrap();
            motion.configure_axis(a, &mut params).unwrap();
            motion.set_enable(a, true, &mut params).unwrap();
        }
        (RemoteLink::new(), LoopbackPort::new(), params, motion)
    }

    // ── Checksum framing ──

    #[test]
    fn checksum_matches_protocol_example() {
        // "ENAB0=1": 69+78+65+66+48+61+49 = 436, mod 256 = 180.
        assert_eq!(checksum(b"ENAB0=1"), 180);
        assert_eq!(frame("ENAB0=1"), "<ENAB0=1|180>");
    }

    #[test]
    fn valid_frame_applies_invalid_is_discarded() {
        let (mut link, mut port, mut params, mut motion) = setup();

        port.feed(b"<ENAB0=1|180>");
        link.poll(&mut port, &mut params, &mut motion).unwrap();
        assert!(motion.is_remote_controlled(0));

        port.feed(b"<ENAB1=1|179>");
        link.poll(&mut port, &mut params, &mut motion).unwrap();
        assert!(!motion.is_remote_controlled(1));
        assert!(link.take_error().is_none()); // silent discard
    }

    #[test]
    fn corrupted_payload_applies_nothing() {
        let (mut link, mut port, mut params, mut motion) = setup();
        // Two commands, one byte of the first flipped.
        let good = frame("ENAB0=1;ENAB1=1");
        let bad = good.replacen("ENAB0", "ENAB2", 1);
        port.feed(bad.as_bytes());
        link.poll(&mut port, &mut params, &mut motion).unwrap();
        assert!(!motion.is_remote_controlled(1));
        assert!(!motion.is_remote_controlled(2));
    }

    // ── Ownership arbitration ──

    #[test]
    fn access_request_takes_ownership_and_acknowledges() {
        let (mut link, mut port, mut params, mut motion) = setup();
        let f = frame("ACCREQ2");
        port.feed(f.as_bytes());
        link.poll(&mut port, &mut params, &mut motion).unwrap();

        assert!(motion.is_remote_controlled(2));
        assert_eq!(params.remote_param(2, remote::ENAB).unwrap(), 1);
        let sent = String::from_utf8(port.take_sent()).unwrap();
        assert_eq!(sent, frame("ENAB2=1"));
    }

    #[test]
    fn position_honored_only_when_owned() {
        let (mut link, mut port, mut params, mut motion) = setup();

        let f = frame("POS2=500");
        port.feed(f.as_bytes());
        link.poll(&mut port, &mut params, &mut motion).unwrap();
        assert!(link.take_error().unwrap().contains("not under remote control"));

        let f = frame("ACCREQ2");
        port.feed(f.as_bytes());
        link.poll(&mut port, &mut params, &mut motion).unwrap();
        let f = frame("POS2=500");
        port.feed(f.as_bytes());
        link.poll(&mut port, &mut params, &mut motion).unwrap();
        assert_eq!(motion.driver_mut(2).position(), 500);
    }

    #[test]
    fn repeated_position_updates_do_not_resend_velocity() {
        let (mut link, mut port, mut params, mut motion) = setup();
        let f = frame("ACCREQ0;POS0=100;POS0=200");
        port.feed(f.as_bytes());
        link.poll(&mut port, &mut params, &mut motion).unwrap();
        assert!(link.repeat_pos_set[0]);
        assert_eq!(motion.driver_mut(0).position(), 200);

        // A velocity command re-arms the first-position behavior.
        let f = frame("VEL0=0");
        port.feed(f.as_bytes());
        link.poll(&mut port, &mut params, &mut motion).unwrap();
        assert!(!link.repeat_pos_set[0]);
    }

    // ── Outbound ──

    #[test]
    fn broadcast_covers_only_remote_owned_axes() {
        let (mut link, mut port, mut params, mut motion) = setup();

        // Nothing owned: no frame at all.
        link.broadcast(&mut port, &mut params, &mut motion).unwrap();
        assert!(port.take_sent().is_empty());

        motion.set_remote_controlled(1, true, &mut params).unwrap();
        motion.set_remote_controlled(3, true, &mut params).unwrap();
        link.broadcast(&mut port, &mut params, &mut motion).unwrap();
        let sent = String::from_utf8(port.take_sent()).unwrap();
        assert_eq!(sent, frame("POS1=0;POS3=0"));
    }

    #[test]
    fn outbound_commands_are_validated() {
        let (mut link, mut port, mut params, mut motion) = setup();
        assert_eq!(
            link.send_command(&mut port, remote::JDIR, 0, 2, &mut params, &mut motion),
            Err(Subsystem::Remote)
        );
        assert_eq!(
            link.send_command(&mut port, remote::JMAX, 0, 20_000, &mut params, &mut motion),
            Err(Subsystem::Remote)
        );
        assert!(port.take_sent().is_empty());
        let _ = link.take_error();

        link.send_command(&mut port, remote::JMAX, 0, 500, &mut params, &mut motion)
            .unwrap();
        assert_eq!(String::from_utf8(port.take_sent()).unwrap(), frame("JMAX0=500"));
    }

    #[test]
    fn enable_all_fans_out_one_frame_per_active_axis() {
        let (mut link, mut port, mut params, mut motion) = setup();
        // Depopulate axis 3.
        params.set_device_kind(3, 0).unwrap();

        link.send_command(&mut port, remote::ENAB, -1, 1, &mut params, &mut motion)
            .unwrap();
        let sent = String::from_utf8(port.take_sent()).unwrap();
        let expected = format!("{}{}{}", frame("ENAB0=1"), frame("ENAB1=1"), frame("ENAB2=1"));
        assert_eq!(sent, expected);
        assert!(motion.is_remote_controlled(0));
        assert!(motion.is_remote_controlled(2));
        assert!(!motion.is_remote_controlled(3));
    }

    #[test]
    fn non_enable_tokens_require_a_concrete_axis() {
        let (mut link, mut port, mut params, mut motion) = setup();
        assert_eq!(
            link.send_command(&mut port, remote::JDIR, -1, 1, &mut params, &mut motion),
            Err(Subsystem::Remote)
        );
        assert_eq!(
            link.send_command(&mut port, remote::ESTP, MAX_AXES as i32, 10, &mut params, &mut motion),
            Err(Subsystem::Remote)
        );
        // Nothing reached the wire.
        assert!(port.take_sent().is_empty());
        assert!(link.take_error().unwrap().contains("axis out of range"));
    }
}
