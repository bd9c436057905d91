//! Time base abstraction
//!
//! The dispatcher paces writes against absolute tick boundaries, so it needs
//! both a monotonic clock and a way to block until a deadline.

use embedded_hal::delay::DelayNs;

/// Monotonic clock with blocking delays
pub trait Clock: DelayNs {
    /// Microseconds since an arbitrary, fixed epoch
    ///
    /// Must never go backwards.
    fn now_us(&self) -> u64;

    /// Block until `deadline_us` has been reached
    ///
    /// Returns immediately if the deadline is already in the past.
    fn sleep_until(&mut self, deadline_us: u64) {
        let now = self.now_us();
        if deadline_us > now {
            let mut remaining = deadline_us - now;
            while remaining > 0 {
                let chunk = remaining.min(u32::MAX as u64);
                self.delay_us(chunk as u32);
                remaining -= chunk;
            }
        }
    }
}
