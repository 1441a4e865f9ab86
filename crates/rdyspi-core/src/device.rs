//! Device handle and open/closed lifecycle
//!
//! A [`Device`] owns its [`DeviceConfiguration`] and, while open, the bus
//! node and a GPIO controller obtained from its [`Platform`].
//!
//! ```text
//!           open(path)
//!   Closed ------------> Open
//!     ^                   |
//!     +------ close() ----+
//! ```
//!
//! All operations block the calling thread. A device is meant to be driven
//! from one thread, and no two devices should claim the same bus node.

use std::path::{Path, PathBuf};

use crate::backend::{BusSetting, GpioPins, Platform, SpiBus};
use crate::config::DeviceConfiguration;
use crate::error::{Error, Result};
use crate::field::{self, Field, Value};
use crate::gpio::Pull;
use crate::mode::{ChipSelect, SpiMode};
use crate::transfer::{self, TransferEngine};

/// Lifecycle state of a [`Device`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
}

struct OpenDevice<B, G> {
    path: PathBuf,
    bus: B,
    gpio: G,
}

/// A handshake-gated SPI device
pub struct Device<P: Platform> {
    platform: P,
    config: DeviceConfiguration,
    open: Option<OpenDevice<P::Bus, P::Gpio>>,
}

impl<P: Platform> Device<P> {
    /// Create a closed device with the default configuration
    pub fn new(platform: P) -> Self {
        Self::with_config(platform, DeviceConfiguration::default())
    }

    /// Create a closed device with a prepared configuration
    pub fn with_config(platform: P, config: DeviceConfiguration) -> Self {
        Self {
            platform,
            config,
            open: None,
        }
    }

    pub fn state(&self) -> State {
        if self.open.is_some() {
            State::Open
        } else {
            State::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Path of the bus node, while open
    pub fn path(&self) -> Option<&Path> {
        self.open.as_ref().map(|o| o.path.as_path())
    }

    pub fn config(&self) -> &DeviceConfiguration {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Open the bus node at `path` and prepare the handshake lines
    ///
    /// Mode, bits per word and speed are pushed to the driver in that order.
    /// A failed step leaves the device closed; settings already accepted by
    /// the driver are not rolled back.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        if let Some(open) = &self.open {
            return Err(Error::AlreadyOpen {
                path: open.path.clone(),
            });
        }

        log::debug!("device: Opening {}", path.display());
        let mut bus = self.platform.open_bus(path)?;

        for setting in [
            BusSetting::Mode(self.config.mode()),
            BusSetting::BitsPerWord(self.config.bits_per_word()),
            BusSetting::MaxSpeed(self.config.max_speed_hz()),
        ] {
            bus.configure(setting)
                .map_err(|source| Error::ConfigureFailed {
                    item: setting.name(),
                    value: setting.value(),
                    source,
                })?;
        }

        let gpio = self.platform.acquire_gpio()?;

        let wr_pin = self.config.write_pin();
        let rdy_pin = self.config.ready_pin();
        gpio.set_input(wr_pin);
        gpio.set_output(wr_pin);
        gpio.set_input(rdy_pin);
        gpio.pull(rdy_pin, Pull::Down);

        log::info!(
            "device: Opened {} (mode={:#x}, speed={} kHz, wr={}, rdy={}{})",
            path.display(),
            self.config.mode().bits(),
            self.config.max_speed_hz() / 1000,
            wr_pin,
            rdy_pin,
            if self.config.invert_ready() { ", busy-low" } else { "" }
        );

        self.open = Some(OpenDevice {
            path: path.to_path_buf(),
            bus,
            gpio,
        });
        Ok(self)
    }

    /// Close the bus node; a no-op on a closed device
    pub fn close(&mut self) -> &mut Self {
        if let Some(open) = self.open.take() {
            log::debug!("device: Closing {}", open.path.display());
        }
        self
    }

    /// Run one handshake-gated full-duplex transfer
    ///
    /// At least one buffer must be given. When both are non-empty they must
    /// have the same length. Returns the driver status of the last byte.
    pub fn transfer(&mut self, write: Option<&[u8]>, read: Option<&mut [u8]>) -> Result<i32> {
        let open = self.open.as_mut().ok_or(Error::NotOpen)?;
        let len = transfer::stream_len(write, read.as_deref())?;

        log::debug!("device: Transfer of {} bytes on {}", len, open.path.display());
        TransferEngine::new(&mut open.bus, &open.gpio, &self.config).run(write, read, len)
    }

    /// Current value of a field
    pub fn get(&self, field: Field) -> Value {
        self.config.get(field)
    }

    /// Set a field, returning the device for chaining
    ///
    /// Kind and range are checked first, then whether the field may change
    /// in the current state.
    pub fn set(&mut self, field: Field, value: impl Into<Value>) -> Result<&mut Self> {
        let value = field::extract(field, value.into())?;
        if self.is_open() && !field.descriptor().mutable_while_open {
            return Err(Error::LockedWhileOpen { field });
        }
        self.config.store(field, value);
        Ok(self)
    }

    /// [`get`](Self::get) by public field name
    pub fn get_by_name(&self, name: &str) -> Result<Value> {
        Ok(self.get(Field::from_name(name)?))
    }

    /// [`set`](Self::set) by public field name
    pub fn set_by_name(&mut self, name: &str, value: Value) -> Result<&mut Self> {
        self.set(Field::from_name(name)?, value)
    }

    pub fn mode(&self) -> SpiMode {
        self.config.mode()
    }

    /// Select one of the `MODE_0..MODE_3` clock modes
    pub fn set_mode(&mut self, mode: u32) -> Result<&mut Self> {
        self.set(Field::Mode, mode)
    }

    pub fn chip_select(&self) -> ChipSelect {
        self.config.chip_select()
    }

    pub fn set_chip_select(&mut self, cs: ChipSelect) -> Result<&mut Self> {
        self.set(Field::ChipSelect, cs.selector())
    }

    /// Bits per word
    pub fn size(&self) -> u8 {
        self.config.bits_per_word()
    }

    pub fn set_size(&mut self, bits: u8) -> Result<&mut Self> {
        self.set(Field::BitsPerWord, bits)
    }

    /// `true` when the least significant bit goes first
    pub fn bit_order(&self) -> bool {
        self.config.mode().contains(SpiMode::LSB_FIRST)
    }

    pub fn set_bit_order(&mut self, lsb_first: bool) -> Result<&mut Self> {
        self.set(Field::BitOrder, lsb_first)
    }

    pub fn max_speed(&self) -> u32 {
        self.config.max_speed_hz()
    }

    pub fn set_max_speed(&mut self, hz: u32) -> Result<&mut Self> {
        self.set(Field::MaxSpeed, hz)
    }

    pub fn half_duplex(&self) -> bool {
        self.config.mode().contains(SpiMode::THREE_WIRE)
    }

    pub fn set_half_duplex(&mut self, enable: bool) -> Result<&mut Self> {
        self.set(Field::HalfDuplex, enable)
    }

    pub fn delay(&self) -> u16 {
        self.config.delay_usecs()
    }

    pub fn set_delay(&mut self, usecs: u16) -> Result<&mut Self> {
        self.set(Field::Delay, usecs)
    }

    pub fn loopback(&self) -> bool {
        self.config.mode().contains(SpiMode::LOOP)
    }

    pub fn set_loopback(&mut self, enable: bool) -> Result<&mut Self> {
        self.set(Field::Loopback, enable)
    }

    pub fn wr_pin(&self) -> u32 {
        self.config.write_pin()
    }

    pub fn set_wr_pin(&mut self, pin: u32) -> Result<&mut Self> {
        self.set(Field::WritePin, pin)
    }

    pub fn rdy_pin(&self) -> u32 {
        self.config.ready_pin()
    }

    pub fn set_rdy_pin(&mut self, pin: u32) -> Result<&mut Self> {
        self.set(Field::ReadyPin, pin)
    }

    pub fn invert_rdy(&self) -> bool {
        self.config.invert_ready()
    }

    pub fn set_invert_rdy(&mut self, invert: bool) -> Result<&mut Self> {
        self.set(Field::InvertReady, invert)
    }

    pub fn b_series(&self) -> bool {
        self.config.b_series()
    }

    pub fn set_b_series(&mut self, enable: bool) -> Result<&mut Self> {
        self.set(Field::BSeries, enable)
    }

    /// Bound every ready wait; `None` restores the unbounded wait
    pub fn set_ready_timeout(&mut self, timeout: Option<std::time::Duration>) -> &mut Self {
        self.config.set_ready_timeout(timeout);
        self
    }
}

impl<P: Platform> Drop for Device<P> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SpiMessage;
    use crate::error::ErrorKind;
    use crate::gpio::{BcmGpio, MemoryRegisters};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Platform whose bus node can never be opened
    #[derive(Default)]
    struct Unreachable {
        opens: Arc<AtomicUsize>,
    }

    struct NoBus;

    impl SpiBus for NoBus {
        fn configure(&mut self, _setting: BusSetting) -> std::io::Result<()> {
            Ok(())
        }

        fn message(&mut self, _msg: &mut SpiMessage<'_>) -> std::io::Result<i32> {
            Ok(1)
        }
    }

    impl Platform for Unreachable {
        type Bus = NoBus;
        type Gpio = BcmGpio<MemoryRegisters>;

        fn open_bus(&mut self, path: &Path) -> Result<NoBus> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Err(Error::OpenFailed {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }

        fn acquire_gpio(&mut self) -> Result<Self::Gpio> {
            Ok(BcmGpio::new(MemoryRegisters::new()))
        }
    }

    #[test]
    fn test_new_device_is_closed() {
        let device = Device::new(Unreachable::default());
        assert_eq!(device.state(), State::Closed);
        assert!(device.path().is_none());
    }

    #[test]
    fn test_open_failure_stays_closed() {
        let mut device = Device::new(Unreachable::default());
        let err = device.open("/dev/spidev9.9").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!device.is_open());
    }

    #[test]
    fn test_transfer_on_closed_device() {
        let mut device = Device::new(Unreachable::default());
        let err = device.transfer(Some(&[1, 2]), None).unwrap_err();
        assert!(matches!(err, Error::NotOpen));
        let err = device.transfer(None, None).unwrap_err();
        assert!(matches!(err, Error::NotOpen));
        assert_eq!(device.platform().opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_when_closed_is_noop() {
        let mut device = Device::new(Unreachable::default());
        device.close().close();
        assert_eq!(device.state(), State::Closed);
    }

    #[test]
    fn test_chained_setters() {
        let mut device = Device::new(Unreachable::default());
        device
            .set_wr_pin(17)
            .and_then(|d| d.set_rdy_pin(27))
            .and_then(|d| d.set_max_speed(2_000_000))
            .and_then(|d| d.set_invert_rdy(true))
            .unwrap();
        assert_eq!(device.wr_pin(), 17);
        assert_eq!(device.rdy_pin(), 27);
        assert_eq!(device.max_speed(), 2_000_000);
        assert!(device.invert_rdy());
    }

    #[test]
    fn test_setters_reject_invalid_values_while_closed() {
        let mut device = Device::new(Unreachable::default());
        assert_eq!(
            device.set_max_speed(0).err().unwrap().kind(),
            ErrorKind::Argument
        );
        assert_eq!(
            device.set_mode(5).err().unwrap().kind(),
            ErrorKind::Argument
        );
        assert_eq!(
            device.set_by_name("loopback", Value::Int(1)).err().unwrap().kind(),
            ErrorKind::Argument
        );
        assert_eq!(device.max_speed(), 1_000_000);
    }

    #[test]
    fn test_by_name() {
        let mut device = Device::new(Unreachable::default());
        device.set_by_name("halfDuplex", Value::Bool(true)).unwrap();
        assert_eq!(device.get_by_name("halfDuplex").unwrap(), Value::Bool(true));
        assert!(device.half_duplex());
        assert!(device.get_by_name("nope").is_err());
    }
}
