//! rdyspi-linux - Linux backend for rdyspi
//!
//! This crate connects [`rdyspi_core::Device`] to real hardware: the bus
//! goes through the `/dev/spidevX.Y` character device and the strobe and
//! ready lines through the BCM GPIO block mapped from `/dev/mem`.
//!
//! # Example
//!
//! ```no_run
//! use rdyspi_core::Device;
//! use rdyspi_linux::LinuxPlatform;
//!
//! let mut device = Device::new(LinuxPlatform);
//! device.set_wr_pin(17)?.set_rdy_pin(27)?;
//! device.open("/dev/spidev0.0")?;
//!
//! let mut id = [0u8; 3];
//! device.transfer(None, Some(&mut id))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device
//! - Root (or `CAP_SYS_RAWIO`) for `/dev/mem`
//! - A BCM2836/BCM2837 based board (Raspberry Pi 2/3)

mod error;
pub mod gpio;
pub mod physmap;
pub mod spidev;

use std::path::Path;

use rdyspi_core::Platform;

pub use error::{LinuxError, Result};
pub use gpio::GpioContext;
pub use spidev::Spidev;

/// spidev bus nodes with the process-wide GPIO context
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxPlatform;

impl Platform for LinuxPlatform {
    type Bus = Spidev;
    type Gpio = GpioContext;

    fn open_bus(&mut self, path: &Path) -> rdyspi_core::Result<Spidev> {
        Ok(Spidev::open(path)?)
    }

    fn acquire_gpio(&mut self) -> rdyspi_core::Result<GpioContext> {
        Ok(GpioContext::acquire()?)
    }
}
