//! std-backed time base

use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use stylus_hal::Clock;

/// Monotonic clock over [`Instant`] with thread sleeps
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for StdClock {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns as u64));
    }
}

impl Clock for StdClock {
    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn sleep_until(&mut self, deadline_us: u64) {
        let now = self.now_us();
        if deadline_us > now {
            thread::sleep(Duration::from_micros(deadline_us - now));
        }
    }
}
