//! rdyspi-dummy - Simulated bus and peer for testing
//!
//! This crate provides a [`Platform`] that needs no hardware. Every bus
//! node opened through it records what the device did into a shared
//! journal, and the GPIO block is a [`SimRegisters`] file with a peer
//! model on the ready line. Faults can be injected at every step of
//! `open` and at any message of a transfer.
//!
//! Long runs (such as `--dry-run` streams) should use
//! [`DummyPlatform::quiet`], which keeps only counters.

mod registers;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rdyspi_core::{BcmGpio, BusSetting, Error, Platform, Result, SpiBus, SpiMessage};

pub use registers::SimRegisters;

/// One single-unit message as seen by the simulated driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Byte sent, `None` for a null tx buffer
    pub tx: Option<u8>,
    /// Byte answered, `None` for a null rx buffer
    pub rx: Option<u8>,
    pub speed_hz: u32,
    pub delay_usecs: u16,
    pub bits_per_word: u8,
    pub status: i32,
}

/// Something the device asked of the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Opened(PathBuf),
    Configured(BusSetting),
    GpioAcquired,
    Message(MessageRecord),
    Closed(PathBuf),
}

/// Faults to inject
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Fail every bus open
    pub open: bool,
    /// Fail the configuration item with this request name
    pub setting: Option<&'static str>,
    /// Fail the message with this index, counted across the platform
    pub message: Option<usize>,
    /// Fail the GPIO mapping
    pub gpio: bool,
}

#[derive(Debug, Default)]
struct Shared {
    journal: Vec<Event>,
    faults: Faults,
    responses: VecDeque<u8>,
    statuses: VecDeque<i32>,
    messages: usize,
    quiet: bool,
}

/// Simulated platform
///
/// Clones share the journal, the fault plan and the register file, so a
/// test can keep one clone while the device owns another.
#[derive(Debug, Clone, Default)]
pub struct DummyPlatform {
    shared: Arc<Mutex<Shared>>,
    registers: Arc<SimRegisters>,
}

impl DummyPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform whose peer drives `ready_pin` to `ready_level` when ready
    pub fn with_peer(ready_pin: u32, ready_level: bool) -> Self {
        let platform = Self::new();
        platform.registers.attach_peer(ready_pin, ready_level);
        platform
    }

    /// Stop recording the journal and register writes
    ///
    /// Message and strobe counters keep counting.
    pub fn quiet(self) -> Self {
        self.shared().quiet = true;
        self.registers.set_recording(false);
        self
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The simulated GPIO register file
    pub fn registers(&self) -> &SimRegisters {
        &self.registers
    }

    /// Replace the fault plan
    pub fn set_faults(&self, faults: Faults) {
        self.shared().faults = faults;
    }

    /// Queue bytes the peer answers with, one per message
    ///
    /// Once the queue is empty the peer answers zero.
    pub fn push_responses(&self, bytes: &[u8]) {
        self.shared().responses.extend(bytes.iter().copied());
    }

    /// Queue driver status codes, one per message
    ///
    /// Once the queue is empty every message returns 1.
    pub fn push_statuses(&self, statuses: &[i32]) {
        self.shared().statuses.extend(statuses.iter().copied());
    }

    /// Everything recorded so far
    pub fn journal(&self) -> Vec<Event> {
        self.shared().journal.clone()
    }

    /// Recorded messages only
    pub fn messages(&self) -> Vec<MessageRecord> {
        self.shared()
            .journal
            .iter()
            .filter_map(|e| match e {
                Event::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of messages the bus has seen, including failed ones
    pub fn message_count(&self) -> usize {
        self.shared().messages
    }

    fn record(&self, event: Event) {
        log::trace!("dummy: {:?}", event);
        let mut shared = self.shared();
        if !shared.quiet {
            shared.journal.push(event);
        }
    }
}

fn injected(what: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("injected {} failure", what))
}

impl Platform for DummyPlatform {
    type Bus = DummyBus;
    type Gpio = BcmGpio<Arc<SimRegisters>>;

    fn open_bus(&mut self, path: &Path) -> Result<DummyBus> {
        if self.shared().faults.open {
            return Err(Error::OpenFailed {
                path: path.to_path_buf(),
                source: injected("open"),
            });
        }
        self.record(Event::Opened(path.to_path_buf()));
        Ok(DummyBus {
            platform: self.clone(),
            path: path.to_path_buf(),
        })
    }

    fn acquire_gpio(&mut self) -> Result<Self::Gpio> {
        if self.shared().faults.gpio {
            return Err(Error::MemoryMap {
                address: 0,
                size: 0,
                source: injected("map"),
            });
        }
        self.record(Event::GpioAcquired);
        Ok(BcmGpio::new(self.registers.clone()))
    }
}

/// Simulated bus node
pub struct DummyBus {
    platform: DummyPlatform,
    path: PathBuf,
}

impl SpiBus for DummyBus {
    fn configure(&mut self, setting: BusSetting) -> std::io::Result<()> {
        if self.platform.shared().faults.setting == Some(setting.name()) {
            return Err(injected(setting.name()));
        }
        self.platform.record(Event::Configured(setting));
        Ok(())
    }

    fn message(&mut self, msg: &mut SpiMessage<'_>) -> std::io::Result<i32> {
        let (status, response) = {
            let mut shared = self.platform.shared();
            let index = shared.messages;
            shared.messages += 1;
            if shared.faults.message == Some(index) {
                return Err(injected("message"));
            }
            let status = shared.statuses.pop_front().unwrap_or(1);
            let response = shared.responses.pop_front().unwrap_or(0);
            (status, response)
        };

        let rx = msg.rx.as_deref_mut().map(|rx| {
            *rx = response;
            response
        });
        self.platform.record(Event::Message(MessageRecord {
            tx: msg.tx.copied(),
            rx,
            speed_hz: msg.speed_hz,
            delay_usecs: msg.delay_usecs,
            bits_per_word: msg.bits_per_word,
            status,
        }));
        Ok(status)
    }
}

impl Drop for DummyBus {
    fn drop(&mut self) {
        self.platform.record(Event::Closed(self.path.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdyspi_core::gpio::regs;
    use rdyspi_core::mode::{MODE_0, MODE_1, MODE_3};
    use rdyspi_core::{ChipSelect, Device, ErrorKind, Field, GpioPins, SpiMode, State, Value};

    const WR: u32 = 17;
    const RDY: u32 = 27;
    const NODE: &str = "/dev/spidev0.0";

    fn device() -> (Device<DummyPlatform>, DummyPlatform) {
        let platform = DummyPlatform::with_peer(RDY, true);
        let mut device = Device::new(platform.clone());
        device
            .set_wr_pin(WR)
            .and_then(|d| d.set_rdy_pin(RDY))
            .and_then(|d| d.set_invert_rdy(false))
            .unwrap();
        (device, platform)
    }

    fn open_device() -> (Device<DummyPlatform>, DummyPlatform) {
        let (mut device, platform) = device();
        device.open(NODE).unwrap();
        (device, platform)
    }

    #[test]
    fn test_open_configures_bus_and_pins() {
        let (device, platform) = open_device();
        assert_eq!(device.state(), State::Open);
        assert_eq!(device.path(), Some(Path::new(NODE)));

        assert_eq!(
            platform.journal(),
            vec![
                Event::Opened(PathBuf::from(NODE)),
                Event::Configured(BusSetting::Mode(SpiMode::empty())),
                Event::Configured(BusSetting::BitsPerWord(8)),
                Event::Configured(BusSetting::MaxSpeed(1_000_000)),
                Event::GpioAcquired,
            ]
        );

        let gpio = BcmGpio::new(platform.registers());
        assert_eq!(gpio.function(WR), 0b001);
        assert_eq!(gpio.function(RDY), 0b000);

        let pull: Vec<_> = platform
            .registers()
            .writes()
            .into_iter()
            .filter(|(word, _)| *word == regs::GPPUD || *word == regs::GPPUDCLK0)
            .collect();
        assert_eq!(
            pull,
            vec![
                (regs::GPPUD, 1),
                (regs::GPPUDCLK0, 1 << RDY),
                (regs::GPPUD, 0),
                (regs::GPPUDCLK0, 0),
            ]
        );
    }

    #[test]
    fn test_write_only_transfer_strobes_each_byte() {
        let (mut device, platform) = open_device();
        platform.push_statuses(&[1, 7]);

        let status = device.transfer(Some(&[0xAA, 0xBB]), None).unwrap();

        assert_eq!(status, 7);
        let messages = platform.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].tx, Some(0xAA));
        assert_eq!(messages[1].tx, Some(0xBB));
        assert!(messages.iter().all(|m| m.rx.is_none()));
        assert_eq!(platform.registers().strobes(), 2);
        // Strobe ends high
        assert!(BcmGpio::new(platform.registers()).is_high(WR));
    }

    #[test]
    fn test_mode_locked_while_open() {
        let (mut device, _platform) = open_device();
        let err = device.set_mode(MODE_1).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(err
            .to_string()
            .contains("cannot be called once device is opened"));
        assert_eq!(device.mode().bits(), MODE_0);
    }

    #[test]
    fn test_transfer_without_buffers() {
        let (mut device, platform) = open_device();
        let err = device.transfer(None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.to_string(), "both buffers cannot be null");
        assert!(platform.messages().is_empty());
    }

    #[test]
    fn test_transfer_length_mismatch() {
        let (mut device, platform) = open_device();
        let mut read = [0u8; 5];
        let err = device.transfer(Some(&[1, 2, 3]), Some(&mut read)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err
            .to_string()
            .contains("read and write buffers must be the same length"));
        assert!(platform.messages().is_empty());
        assert_eq!(platform.registers().strobes(), 0);
    }

    #[test]
    fn test_full_duplex_reads_into_each_position() {
        let (mut device, platform) = open_device();
        platform.push_responses(&[0x10, 0x20, 0x30]);
        let mut read = [0u8; 3];

        device.transfer(Some(&[1, 2, 3]), Some(&mut read)).unwrap();

        assert_eq!(read, [0x10, 0x20, 0x30]);
        let tx: Vec<_> = platform.messages().iter().map(|m| m.tx).collect();
        assert_eq!(tx, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_empty_write_buffer_reads_only() {
        let (mut device, platform) = open_device();
        platform.push_responses(&[0xC3, 0x3C]);
        let mut read = [0u8; 2];

        device.transfer(Some(&[]), Some(&mut read)).unwrap();

        assert_eq!(read, [0xC3, 0x3C]);
        assert!(platform.messages().iter().all(|m| m.tx.is_none()));
    }

    #[test]
    fn test_messages_carry_configuration() {
        let (mut device, platform) = device();
        device
            .set_max_speed(250_000)
            .and_then(|d| d.set_delay(4))
            .and_then(|d| d.set_size(9))
            .unwrap();
        device.open(NODE).unwrap();
        device.transfer(Some(&[0x01]), None).unwrap();

        let msg = &platform.messages()[0];
        assert_eq!(msg.speed_hz, 250_000);
        assert_eq!(msg.delay_usecs, 4);
        assert_eq!(msg.bits_per_word, 9);
    }

    #[test]
    fn test_busy_peer_is_waited_out() {
        let (mut device, platform) = open_device();
        platform.registers().set_busy_polls(3);

        device.transfer(Some(&[1, 2, 3, 4]), None).unwrap();
        assert_eq!(platform.messages().len(), 4);
    }

    #[test]
    fn test_inverted_ready_with_busy_low_peer() {
        let platform = DummyPlatform::with_peer(RDY, false);
        platform.registers().set_busy_polls(2);
        let mut device = Device::new(platform.clone());
        device
            .set_wr_pin(WR)
            .and_then(|d| d.set_rdy_pin(RDY))
            .and_then(|d| d.open(NODE))
            .unwrap();
        // Polarity may change while open
        device.set_invert_rdy(true).unwrap();

        device.transfer(Some(&[0x55, 0x66]), None).unwrap();
        assert_eq!(platform.messages().len(), 2);
    }

    #[test]
    fn test_ready_timeout() {
        let platform = DummyPlatform::with_peer(RDY, false);
        let mut device = Device::new(platform.clone());
        device
            .set_wr_pin(WR)
            .and_then(|d| d.set_rdy_pin(RDY))
            .unwrap();
        device.set_ready_timeout(Some(std::time::Duration::from_millis(1)));
        device.open(NODE).unwrap();

        let err = device.transfer(Some(&[1]), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(platform.messages().is_empty());
    }

    #[test]
    fn test_mid_stream_failure_reports_index() {
        let (mut device, platform) = open_device();
        platform.set_faults(Faults {
            message: Some(2),
            ..Default::default()
        });

        let err = device.transfer(Some(&[1, 2, 3, 4]), None).unwrap_err();
        assert!(matches!(err, Error::TransferFailed { index: 2, .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(platform.messages().len(), 2);
        // Still open, the next transfer starts a fresh stream
        assert!(device.is_open());
    }

    #[test]
    fn test_transfer_on_closed_device_touches_nothing() {
        let (mut device, platform) = device();
        let err = device.transfer(Some(&[1]), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(platform.journal().is_empty());
        assert!(platform.registers().writes().is_empty());
    }

    #[test]
    fn test_open_twice() {
        let (mut device, _platform) = open_device();
        let err = device.open(NODE).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(device.is_open());
    }

    #[test]
    fn test_open_failures_leave_device_closed() {
        let (mut device, platform) = device();

        platform.set_faults(Faults {
            open: true,
            ..Default::default()
        });
        assert_eq!(device.open(NODE).err().unwrap().kind(), ErrorKind::Io);

        platform.set_faults(Faults {
            setting: Some("SPI_IOC_WR_BITS_PER_WORD"),
            ..Default::default()
        });
        let err = device.open(NODE).err().unwrap();
        assert!(err.to_string().contains("SPI_IOC_WR_BITS_PER_WORD"));
        assert!(!device.is_open());

        platform.set_faults(Faults {
            gpio: true,
            ..Default::default()
        });
        assert_eq!(device.open(NODE).err().unwrap().kind(), ErrorKind::Io);
        assert!(!device.is_open());

        // Every partially opened node was closed again
        let opened = platform
            .journal()
            .iter()
            .filter(|e| matches!(e, Event::Opened(_)))
            .count();
        let closed = platform
            .journal()
            .iter()
            .filter(|e| matches!(e, Event::Closed(_)))
            .count();
        assert_eq!(opened, 2);
        assert_eq!(closed, 2);

        platform.set_faults(Faults::default());
        device.open(NODE).unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut device, platform) = open_device();
        device.close();
        device.close();
        assert_eq!(device.state(), State::Closed);
        assert_eq!(
            platform.journal().last(),
            Some(&Event::Closed(PathBuf::from(NODE)))
        );

        // Closed again, every field may change
        device.set_mode(MODE_3).unwrap();
        device.open(NODE).unwrap();
    }

    #[test]
    fn test_drop_closes() {
        let (device, platform) = open_device();
        drop(device);
        assert_eq!(
            platform.journal().last(),
            Some(&Event::Closed(PathBuf::from(NODE)))
        );
    }

    #[test]
    fn test_quiet_platform_keeps_only_counters() {
        let platform = DummyPlatform::with_peer(RDY, true).quiet();
        let mut device = Device::new(platform.clone());
        device
            .set_wr_pin(WR)
            .and_then(|d| d.set_rdy_pin(RDY))
            .and_then(|d| d.open(NODE))
            .unwrap();

        let chunk = [0x5A; 256];
        for _ in 0..40 {
            device.transfer(Some(&chunk), None).unwrap();
        }
        device.close();

        assert_eq!(platform.message_count(), 40 * 256);
        assert_eq!(platform.registers().strobes(), 40 * 256);
        assert!(platform.journal().is_empty());
        assert!(platform.registers().writes().is_empty());
        // Levels are still simulated
        assert!(BcmGpio::new(platform.registers()).is_high(WR));
    }

    #[test]
    fn test_positive_fields() {
        let (mut device, _platform) = device();
        for field in [
            Field::BitsPerWord,
            Field::MaxSpeed,
            Field::Delay,
            Field::WritePin,
            Field::ReadyPin,
        ] {
            for bad in [0, -1] {
                let err = device.set(field, bad).err().unwrap();
                assert_eq!(err.kind(), ErrorKind::Argument, "{} = {}", field, bad);
            }
            device.set(field, 5).unwrap();
            assert_eq!(device.get(field), Value::Int(5));
            assert_eq!(device.get(field), device.get(field));
        }
    }

    #[test]
    fn test_locked_fields_while_open() {
        let (mut device, _platform) = device();
        device.set_delay(2).unwrap();
        device.open(NODE).unwrap();
        for field in Field::ALL {
            let value = device.get(field);
            let result = device.set(field, value);
            if matches!(field, Field::InvertReady | Field::BSeries) {
                assert!(result.is_ok(), "{} should stay mutable", field);
            } else {
                let err = result.err().unwrap();
                assert_eq!(err.kind(), ErrorKind::State, "{}", field);
            }
        }

        device.close();
        for field in Field::ALL {
            let value = device.get(field);
            device.set(field, value).unwrap();
        }
    }

    #[test]
    fn test_chip_select_tristate() {
        let (mut device, _platform) = device();
        device.set_chip_select(ChipSelect::ActiveHigh).unwrap();
        assert_eq!(device.get(Field::ChipSelect), Value::Int(0x04));
        device.set_chip_select(ChipSelect::None).unwrap();
        assert_eq!(device.get(Field::ChipSelect), Value::Int(0x40));
        assert!(!device.mode().contains(SpiMode::CS_HIGH));
        device.set_chip_select(ChipSelect::ActiveLow).unwrap();
        assert_eq!(device.get(Field::ChipSelect), Value::Int(0));
    }

    #[test]
    fn test_mode_bits_reach_driver() {
        let (mut device, platform) = device();
        device
            .set_mode(MODE_3)
            .and_then(|d| d.set_bit_order(true))
            .and_then(|d| d.set_loopback(true))
            .unwrap();
        device.open(NODE).unwrap();

        let expected = SpiMode::CPOL | SpiMode::CPHA | SpiMode::LSB_FIRST | SpiMode::LOOP;
        assert!(platform
            .journal()
            .contains(&Event::Configured(BusSetting::Mode(expected))));
    }
}
