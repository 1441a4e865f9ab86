//! Process-wide GPIO context
//!
//! The BCM GPIO block is mapped once, on the first [`GpioContext::acquire`],
//! and shared by every open device in the process. Each device holds a
//! [`GpioContext`] handle; [`GpioContext::release`] drops the process-wide
//! reference so the window is unmapped once the last handle is gone.

use std::sync::{Arc, Mutex};

use rdyspi_core::gpio::GPIO_COUNT;
use rdyspi_core::{BcmGpio, GpioPins, Pull};

use crate::error::Result;
use crate::physmap::PhysMap;

/// Peripheral base of the BCM2836/BCM2837
pub const PERIPHERAL_BASE: u64 = 0x3F00_0000;

/// Physical address of the GPIO block
pub const GPIO_BASE: u64 = PERIPHERAL_BASE + 0x20_0000;

/// Length of the mapped GPIO window
pub const BLOCK_SIZE: usize = 4 * 1024;

static CONTEXT: Mutex<Option<Arc<BcmGpio<PhysMap>>>> = Mutex::new(None);

/// Shared handle on the mapped GPIO block
#[derive(Clone)]
pub struct GpioContext {
    gpio: Arc<BcmGpio<PhysMap>>,
}

impl GpioContext {
    /// Get the process-wide context, mapping the block on first use
    pub fn acquire() -> Result<Self> {
        let mut slot = CONTEXT.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(gpio) = slot.as_ref() {
            return Ok(Self { gpio: gpio.clone() });
        }

        let map = PhysMap::new(GPIO_BASE, BLOCK_SIZE)?;
        log::info!(
            "gpio: Mapped {} lines at {:#x}",
            GPIO_COUNT,
            map.phys_addr()
        );
        let gpio = Arc::new(BcmGpio::new(map));
        *slot = Some(gpio.clone());
        Ok(Self { gpio })
    }

    /// Drop the process-wide reference
    ///
    /// Handles already given out keep the mapping alive; the next
    /// [`acquire`](Self::acquire) maps the block again.
    pub fn release() {
        let mut slot = CONTEXT.lock().unwrap_or_else(|e| e.into_inner());
        if slot.take().is_some() {
            log::debug!("gpio: Released context");
        }
    }
}

impl GpioPins for GpioContext {
    fn set_input(&self, pin: u32) {
        self.gpio.set_input(pin)
    }

    fn set_output(&self, pin: u32) {
        self.gpio.set_output(pin)
    }

    fn set_high(&self, pin: u32) {
        self.gpio.set_high(pin)
    }

    fn set_low(&self, pin: u32) {
        self.gpio.set_low(pin)
    }

    fn is_high(&self, pin: u32) -> bool {
        self.gpio.is_high(pin)
    }

    fn pull(&self, pin: u32, pull: Pull) {
        self.gpio.pull(pin, pull)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_address() {
        assert_eq!(GPIO_BASE, 0x3F20_0000);
        // The window must cover every register up to GPPUDCLK1
        assert!(BLOCK_SIZE >= rdyspi_core::gpio::regs::BLOCK_WORDS * 4);
    }

    #[test]
    #[ignore] // Requires root and /dev/mem access
    fn test_acquire_shares_mapping() {
        let a = GpioContext::acquire().unwrap();
        let b = GpioContext::acquire().unwrap();
        assert!(Arc::ptr_eq(&a.gpio, &b.gpio));
        GpioContext::release();
        let c = GpioContext::acquire().unwrap();
        assert!(!Arc::ptr_eq(&a.gpio, &c.gpio));
        GpioContext::release();
    }
}
