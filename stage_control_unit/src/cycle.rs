//! Cooperative cycle runner.
//!
//! Single-threaded scheduler: each task owns a fixed period and runs when
//! its deadline passes, then the loop sleeps until the earliest next
//! deadline. A stalled task slips its slot; deadlines catch up instead of
//! bursting to replay missed slots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::config::Intervals;
use crate::controller::Controller;

/// Fixed-period task deadline.
struct TaskClock {
    next: Instant,
    period: Duration,
}

impl TaskClock {
    fn new(period_ms: u64, now: Instant) -> Self {
        let period = Duration::from_millis(period_ms);
        Self {
            next: now + period,
            period,
        }
    }

    /// Whether the task is due at `now`. Advances the deadline past `now`
    /// so a long stall yields one run, not a burst.
    fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        while self.next <= now {
            self.next += self.period;
        }
        true
    }
}

/// Runs the controller tasks at their configured cadence.
pub struct CycleRunner {
    controller: Controller,
    running: Arc<AtomicBool>,
    serial: TaskClock,
    remote_rx: TaskClock,
    remote_send: TaskClock,
    fault: TaskClock,
    motion: TaskClock,
}

impl CycleRunner {
    /// Build a runner; all deadlines start one period from now.
    pub fn new(controller: Controller, intervals: &Intervals) -> Self {
        let now = Instant::now();
        Self {
            controller,
            running: Arc::new(AtomicBool::new(true)),
            serial: TaskClock::new(intervals.serial_ms, now),
            remote_rx: TaskClock::new(intervals.remote_rx_ms, now),
            remote_send: TaskClock::new(intervals.remote_send_ms, now),
            fault: TaskClock::new(intervals.fault_ms, now),
            motion: TaskClock::new(intervals.motion_ms, now),
        }
    }

    /// Shared stop flag; clear it to leave [`CycleRunner::run`].
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Access the wired controller.
    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    /// Run every task due at `now`, in fixed order.
    pub fn step(&mut self, now: Instant) {
        if self.serial.due(now) {
            self.controller.serial_task();
        }
        if self.remote_rx.due(now) {
            self.controller.remote_rx_task();
        }
        if self.remote_send.due(now) {
            self.controller.remote_send_task();
        }
        if self.fault.due(now) {
            self.controller.fault_task();
        }
        if self.motion.due(now) {
            self.controller.motion_task();
        }
    }

    /// Enter the cycle loop until the stop flag clears.
    pub fn run(&mut self) {
        info!("entering cooperative cycle");
        while self.running.load(Ordering::SeqCst) {
            self.step(Instant::now());
            let next = self
                .serial
                .next
                .min(self.remote_rx.next)
                .min(self.remote_send.next)
                .min(self.fault.next)
                .min(self.motion.next);
            if let Some(pause) = next.checked_duration_since(Instant::now()) {
                std::thread::sleep(pause);
            }
        }
        info!("cycle stopped");
    }
}
