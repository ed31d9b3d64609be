//! End-to-end exercise of the wired controller: host commands in through
//! the primary link, remote frames in through the secondary link, with
//! ownership arbitration between the two.

use std::cell::RefCell;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use stage_control_unit::controller::Controller;
use stage_control_unit::link::{LinkPort, LoopbackPort};
use stage_control_unit::motion::MotionSupervisor;
use stage_control_unit::params::ParameterStore;
use stage_control_unit::remote::frame;
use stage_common::types::ConfigureMode;

/// Cloneable handle over a loopback port so the test keeps a view of a
/// port owned by the controller.
#[derive(Clone)]
struct SharedPort(Rc<RefCell<LoopbackPort>>);

impl SharedPort {
    fn new() -> Self {
        Self(Rc::new(RefCell::new(LoopbackPort::new())))
    }

    fn feed(&self, bytes: &[u8]) {
        self.0.borrow_mut().feed(bytes);
    }

    fn take_sent(&self) -> Vec<u8> {
        self.0.borrow_mut().take_sent()
    }
}

impl LinkPort for SharedPort {
    fn poll(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.0.borrow_mut().poll(buf)
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.0.borrow_mut().send(bytes)
    }
}

struct Rig {
    controller: Controller,
    host: SharedPort,
    remote: SharedPort,
}

impl Rig {
    fn new() -> Self {
        let host = SharedPort::new();
        let remote = SharedPort::new();
        let params = ParameterStore::new(PathBuf::from("/nonexistent/params.bin"));
        let mut controller = Controller::new(
            params,
            MotionSupervisor::new(),
            Box::new(host.clone()),
            Box::new(remote.clone()),
        );
        controller.startup(ConfigureMode::Defaults);
        Self {
            controller,
            host,
            remote,
        }
    }

    /// Send host lines and collect the reply lines.
    fn host_exchange(&mut self, lines: &str) -> Vec<String> {
        self.host.feed(lines.as_bytes());
        self.controller.serial_task();
        String::from_utf8(self.host.take_sent())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn remote_frame(&mut self, payload: &str) {
        let f = frame(payload);
        self.remote.feed(f.as_bytes());
        self.controller.remote_rx_task();
    }
}

#[test]
fn host_session_moves_a_simulated_axis() {
    let mut rig = Rig::new();
    let replies = rig.host_exchange(
        "*IDN?\nSMP_RMXV0,5000\nSMS_ENAB0,1\nSMC_MPOS0,250\nGMS_XACT0\n",
    );
    assert_eq!(
        replies,
        vec![
            "Stage Driver Pico",
            "ERROR=0",
            "ERROR=0",
            "ERROR=0",
            "MS_XACT0=250",
        ]
    );
    // The motion poll notices completion before the done flag reads true.
    rig.controller.motion_task();
    assert_eq!(rig.host_exchange("GMC_POSR0\n"), vec!["MC_POSR0=1"]);
}

#[test]
fn remote_takeover_locks_out_the_host() {
    let mut rig = Rig::new();
    rig.host_exchange("SMP_RMXV0,5000\nSMS_ENAB0,1\n");

    // Remote takes axis 0 and gets the acknowledgment frame.
    rig.remote_frame("ACCREQ0");
    assert_eq!(
        String::from_utf8(rig.remote.take_sent()).unwrap(),
        frame("ENAB0=1")
    );

    // Host motion commands bounce, reads still work.
    let replies = rig.host_exchange("SMC_MPOS0,100\nGMS_XACT0\n");
    assert_eq!(replies, vec!["ERROR=-1", "MS_XACT0=0"]);
    let report = rig.host_exchange("GPC_EMSG\n");
    assert!(report[0].contains("Serial: Motor is under remote control"));

    // Remote position commands land and show up in the broadcast.
    rig.remote_frame("POS0=500");
    rig.controller.remote_send_task();
    assert_eq!(
        String::from_utf8(rig.remote.take_sent()).unwrap(),
        frame("POS0=500")
    );

    // Remote hands the axis back; the host regains motion control.
    rig.remote_frame("ENAB0=0");
    let replies = rig.host_exchange("SMC_MPOS0,750\nGMS_XACT0\n");
    assert_eq!(replies, vec!["ERROR=0", "MS_XACT0=750"]);
}

#[test]
fn config_command_pushes_remote_parameters() {
    let mut rig = Rig::new();
    // JMAX forwarding validates against RMXV, so set that first.
    let replies = rig.host_exchange("SMP_RMXV1,5000\nSMC_CONF1\n");
    assert_eq!(replies, vec!["ERROR=0", "ERROR=0"]);
    let sent = String::from_utf8(rig.remote.take_sent()).unwrap();
    assert_eq!(sent.matches('<').count(), 5);
    assert!(sent.contains("ENAB1=0"));
    assert!(sent.contains("ESTP1=10"));
}
