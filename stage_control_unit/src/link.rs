//! Byte-stream port abstraction for the two command links.
//!
//! Both protocol handlers poll their port once per cycle task and never
//! block on input. A port is either a non-blocking character device (real
//! deployment) or an in-memory loopback (tests and simulation mode).

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Non-blocking byte port.
pub trait LinkPort {
    /// Drain currently available input bytes into `buf`. Returns the
    /// number of bytes appended; 0 when nothing is pending.
    fn poll(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;

    /// Transmit bytes.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
}

// ─── Character Device Port ──────────────────────────────────────────

/// Port over a character device (serial tty), opened non-blocking.
pub struct TtyPort {
    file: File,
}

impl TtyPort {
    /// Open a device path with `O_NONBLOCK | O_NOCTTY`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(path)?;
        Ok(Self { file })
    }
}

impl LinkPort for TtyPort {
    fn poll(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let mut chunk = [0u8; 256];
        let mut total = 0;
        loop {
            match self.file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }
}

// ─── Loopback Port ──────────────────────────────────────────────────

/// In-memory port used in simulation mode and tests. Input is queued with
/// [`LoopbackPort::feed`]; output accumulates until [`LoopbackPort::take_sent`].
#[derive(Debug, Default)]
pub struct LoopbackPort {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
}

impl LoopbackPort {
    /// Create an empty loopback port.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by the next [`LinkPort::poll`].
    pub fn feed(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Take everything transmitted so far.
    pub fn take_sent(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }
}

impl LinkPort for LoopbackPort {
    fn poll(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let n = self.inbound.len();
        buf.extend(self.inbound.drain(..));
        Ok(n)
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.outbound.extend_from_slice(bytes);
        Ok(())
    }
}
