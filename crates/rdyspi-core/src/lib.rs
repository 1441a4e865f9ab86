//! rdyspi-core - Handshake-gated SPI device driver
//!
//! This crate drives SPI peripherals that pace the host with two extra
//! GPIO lines: a write strobe the host pulses after every byte, and a
//! ready (or busy) line the peer holds until it can take the next one.
//!
//! The crate is backend-agnostic. A [`Platform`] supplies the bus node and
//! the GPIO controller; see `rdyspi-linux` for spidev + `/dev/mem` and
//! `rdyspi-dummy` for a simulated peer.
//!
//! # Example
//!
//! ```ignore
//! use rdyspi_core::{Device, Field};
//!
//! let mut device = Device::new(platform);
//! device
//!     .set_wr_pin(17)?
//!     .set_rdy_pin(27)?
//!     .set_max_speed(2_000_000)?
//!     .open("/dev/spidev0.0")?;
//!
//! let mut reply = [0u8; 4];
//! device.transfer(Some(&[0x9f, 0, 0, 0]), Some(&mut reply))?;
//!
//! // Polarity of the ready line may change while open
//! device.set(Field::InvertReady, true)?;
//! ```

pub mod backend;
pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod field;
pub mod gpio;
pub mod mode;
pub mod transfer;

pub use backend::{BusSetting, GpioPins, Platform, SpiBus, SpiMessage};
pub use clock::BusyWaitClock;
pub use config::{ConfigFile, DeviceConfiguration};
pub use device::{Device, State};
pub use error::{Error, ErrorKind, Result};
pub use field::{extract, ArgKind, Field, Value, FIELDS};
pub use gpio::{BcmGpio, Pull, RegisterBlock};
pub use mode::{ChipSelect, SpiMode};
