//! Busy-wait microsecond delays
//!
//! The handshake timing needs single-digit microsecond holds, well below the
//! resolution the scheduler gives `thread::sleep`. These helpers spin on the
//! monotonic clock instead and keep the CPU busy for the whole duration.

use std::time::{Duration, Instant};

/// Spin until `deadline` has been reached or passed
#[inline]
pub fn spin_until(deadline: Instant) {
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

/// Block the calling thread for `us` microseconds without sleeping
#[inline]
pub fn delay_us(us: u32) {
    spin_until(Instant::now() + Duration::from_micros(us as u64));
}

/// Microsecond spin delay as a value, for code that wants a clock handle
#[derive(Debug, Clone, Copy, Default)]
pub struct BusyWaitClock;

impl BusyWaitClock {
    /// See [`delay_us`]
    #[inline]
    pub fn delay_us(&self, us: u32) {
        delay_us(us);
    }
}
