//! Hardware seams
//!
//! A [`Platform`] hands out the two resources an open device needs: an
//! [`SpiBus`] for the bus node and a [`GpioPins`] controller for the
//! strobe/ready lines. `rdyspi-linux` implements these over spidev and
//! `/dev/mem`; `rdyspi-dummy` simulates them.

use std::path::Path;

use crate::error::Result;
use crate::gpio::Pull;
use crate::mode::SpiMode;

/// A scalar bus configuration item, applied before any transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSetting {
    /// `SPI_IOC_WR_MODE`
    Mode(SpiMode),
    /// `SPI_IOC_WR_BITS_PER_WORD`
    BitsPerWord(u8),
    /// `SPI_IOC_WR_MAX_SPEED_HZ`
    MaxSpeed(u32),
}

impl BusSetting {
    /// Name of the kernel request applying this setting
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mode(_) => "SPI_IOC_WR_MODE",
            Self::BitsPerWord(_) => "SPI_IOC_WR_BITS_PER_WORD",
            Self::MaxSpeed(_) => "SPI_IOC_WR_MAX_SPEED_HZ",
        }
    }

    /// Raw value, for diagnostics
    pub fn value(&self) -> u32 {
        match *self {
            Self::Mode(mode) => mode.bits(),
            Self::BitsPerWord(bits) => bits as u32,
            Self::MaxSpeed(speed) => speed,
        }
    }
}

/// One single-unit SPI message
///
/// `tx`/`rx` of `None` are sent to the kernel as null buffers.
#[derive(Debug)]
pub struct SpiMessage<'a> {
    pub tx: Option<&'a u8>,
    pub rx: Option<&'a mut u8>,
    pub speed_hz: u32,
    pub delay_usecs: u16,
    pub bits_per_word: u8,
}

/// An open SPI bus node
///
/// Dropping the bus closes the underlying descriptor.
pub trait SpiBus {
    /// Apply one configuration item
    fn configure(&mut self, setting: BusSetting) -> std::io::Result<()>;

    /// Run one message transaction and return the driver's status
    fn message(&mut self, msg: &mut SpiMessage<'_>) -> std::io::Result<i32>;
}

/// Pin-level access to the GPIO block
///
/// Callers must serialize use of a given pin; the controller itself only
/// guards its own read-modify-write sequences.
pub trait GpioPins {
    /// Configure `pin` as an input
    fn set_input(&self, pin: u32);

    /// Configure `pin` as an output; the pin must be an input first
    fn set_output(&self, pin: u32);

    /// Drive `pin` high
    fn set_high(&self, pin: u32);

    /// Drive `pin` low
    fn set_low(&self, pin: u32);

    /// Sample the level of `pin`
    fn is_high(&self, pin: u32) -> bool;

    /// Latch a pull resistor setting onto `pin`, then release the pull
    /// select and clock registers
    fn pull(&self, pin: u32, pull: Pull);
}

impl<G: GpioPins + ?Sized> GpioPins for std::sync::Arc<G> {
    fn set_input(&self, pin: u32) {
        (**self).set_input(pin)
    }

    fn set_output(&self, pin: u32) {
        (**self).set_output(pin)
    }

    fn set_high(&self, pin: u32) {
        (**self).set_high(pin)
    }

    fn set_low(&self, pin: u32) {
        (**self).set_low(pin)
    }

    fn is_high(&self, pin: u32) -> bool {
        (**self).is_high(pin)
    }

    fn pull(&self, pin: u32, pull: Pull) {
        (**self).pull(pin, pull)
    }
}

/// Source of bus and GPIO resources for a [`crate::Device`]
pub trait Platform {
    type Bus: SpiBus;
    type Gpio: GpioPins;

    /// Open the bus node at `path` for blocking read/write
    fn open_bus(&mut self, path: &Path) -> Result<Self::Bus>;

    /// Obtain the GPIO controller, mapping it on first use
    fn acquire_gpio(&mut self) -> Result<Self::Gpio>;
}
