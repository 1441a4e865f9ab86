//! Device configuration
//!
//! [`DeviceConfiguration`] holds every parameter of a device. Values only
//! enter through [`DeviceConfiguration::set`], which validates them against
//! the field table in [`crate::field`]. The open/closed locking rules are
//! enforced one level up, by [`crate::Device`].
//!
//! Configurations can also be loaded from TOML:
//!
//! ```toml
//! [spi]
//! device = "/dev/spidev0.0"
//! mode = 0
//! chip_select = "low"
//! max_speed_hz = 1000000
//! write_pin = 17
//! ready_pin = 27
//! invert_ready = false
//! ready_timeout_us = 500000
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::field::{self, Field, Value};
use crate::mode::{ChipSelect, SpiMode};

/// Default bus clock (1 MHz)
pub const DEFAULT_SPEED_HZ: u32 = 1_000_000;

/// Default word size
pub const DEFAULT_BITS_PER_WORD: u8 = 8;

/// Parameter set of one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfiguration {
    mode: SpiMode,
    max_speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    write_pin: u32,
    ready_pin: u32,
    invert_ready: bool,
    b_series: bool,
    ready_timeout: Option<Duration>,
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self {
            mode: SpiMode::empty(),
            max_speed_hz: DEFAULT_SPEED_HZ,
            delay_usecs: 0,
            bits_per_word: DEFAULT_BITS_PER_WORD,
            write_pin: 0,
            ready_pin: 0,
            invert_ready: false,
            b_series: false,
            ready_timeout: None,
        }
    }
}

impl DeviceConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `field`
    pub fn get(&self, field: Field) -> Value {
        match field {
            Field::Mode => Value::Int(self.mode.bits() as i64),
            Field::ChipSelect => {
                Value::Int((self.mode & (SpiMode::CS_HIGH | SpiMode::NO_CS)).bits() as i64)
            }
            Field::BitsPerWord => Value::Int(self.bits_per_word as i64),
            Field::BitOrder => Value::Bool(self.mode.contains(SpiMode::LSB_FIRST)),
            Field::MaxSpeed => Value::Int(self.max_speed_hz as i64),
            Field::HalfDuplex => Value::Bool(self.mode.contains(SpiMode::THREE_WIRE)),
            Field::Delay => Value::Int(self.delay_usecs as i64),
            Field::Loopback => Value::Bool(self.mode.contains(SpiMode::LOOP)),
            Field::WritePin => Value::Int(self.write_pin as i64),
            Field::ReadyPin => Value::Int(self.ready_pin as i64),
            Field::InvertReady => Value::Bool(self.invert_ready),
            Field::BSeries => Value::Bool(self.b_series),
        }
    }

    /// Validate and store a value
    pub fn set(&mut self, field: Field, value: impl Into<Value>) -> Result<&mut Self> {
        let value = field::extract(field, value.into())?;
        self.store(field, value);
        Ok(self)
    }

    /// Change only the clock mode (`CPOL`/`CPHA`)
    ///
    /// Unlike `set(Field::Mode, ..)`, chip select and the bit order,
    /// half duplex and loopback toggles are kept.
    pub fn set_clock_mode(&mut self, mode: impl Into<Value>) -> Result<&mut Self> {
        let clock = SpiMode::CPOL | SpiMode::CPHA;
        let keep = self.mode - clock;
        self.set(Field::Mode, mode)?;
        self.mode = (self.mode & clock) | keep;
        Ok(self)
    }

    /// Store an already validated value
    pub(crate) fn store(&mut self, field: Field, value: Value) {
        match (field, value) {
            // Mode replaces the whole word, including CS and toggle bits
            (Field::Mode, Value::Int(v)) => self.mode = SpiMode::from_bits_retain(v as u32),
            (Field::ChipSelect, Value::Int(v)) => {
                ChipSelect::from_selector(v).apply(&mut self.mode)
            }
            (Field::BitsPerWord, Value::Int(v)) => self.bits_per_word = v as u8,
            (Field::BitOrder, Value::Bool(b)) => self.mode.set(SpiMode::LSB_FIRST, b),
            (Field::MaxSpeed, Value::Int(v)) => self.max_speed_hz = v as u32,
            (Field::HalfDuplex, Value::Bool(b)) => self.mode.set(SpiMode::THREE_WIRE, b),
            (Field::Delay, Value::Int(v)) => self.delay_usecs = v as u16,
            (Field::Loopback, Value::Bool(b)) => self.mode.set(SpiMode::LOOP, b),
            (Field::WritePin, Value::Int(v)) => self.write_pin = v as u32,
            (Field::ReadyPin, Value::Int(v)) => self.ready_pin = v as u32,
            (Field::InvertReady, Value::Bool(b)) => self.invert_ready = b,
            (Field::BSeries, Value::Bool(b)) => self.b_series = b,
            (field, value) => debug_assert!(false, "{} stored with {:?}", field, value),
        }
    }

    pub fn mode(&self) -> SpiMode {
        self.mode
    }

    pub fn chip_select(&self) -> ChipSelect {
        ChipSelect::from_mode(self.mode)
    }

    pub fn max_speed_hz(&self) -> u32 {
        self.max_speed_hz
    }

    pub fn delay_usecs(&self) -> u16 {
        self.delay_usecs
    }

    pub fn bits_per_word(&self) -> u8 {
        self.bits_per_word
    }

    pub fn write_pin(&self) -> u32 {
        self.write_pin
    }

    pub fn ready_pin(&self) -> u32 {
        self.ready_pin
    }

    pub fn invert_ready(&self) -> bool {
        self.invert_ready
    }

    pub fn b_series(&self) -> bool {
        self.b_series
    }

    /// Bound on every ready wait; `None` waits forever
    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout
    }

    pub fn set_ready_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.ready_timeout = timeout;
        self
    }

    /// Level of the ready pin that means "ready"
    pub fn ready_level(&self) -> bool {
        !self.invert_ready
    }

    /// Render as a TOML `[spi]` table
    pub fn to_toml_string(&self, device: Option<&Path>) -> String {
        let mut out = String::from("[spi]\n");
        if let Some(device) = device {
            let device = toml::Value::String(device.display().to_string());
            let _ = writeln!(out, "device = {}", device);
        }
        let base = self.mode & (SpiMode::CPHA | SpiMode::CPOL);
        let _ = writeln!(out, "mode = {}", base.bits());
        let _ = writeln!(out, "chip_select = \"{}\"", self.chip_select().name());
        let _ = writeln!(out, "bits_per_word = {}", self.bits_per_word);
        let _ = writeln!(out, "lsb_first = {}", self.mode.contains(SpiMode::LSB_FIRST));
        let _ = writeln!(out, "max_speed_hz = {}", self.max_speed_hz);
        let _ = writeln!(out, "half_duplex = {}", self.mode.contains(SpiMode::THREE_WIRE));
        let _ = writeln!(out, "loopback = {}", self.mode.contains(SpiMode::LOOP));
        // Zero is the unset default and is not accepted back by the setters
        for (key, value) in [
            ("delay_usecs", self.delay_usecs as u32),
            ("write_pin", self.write_pin),
            ("ready_pin", self.ready_pin),
        ] {
            if value != 0 {
                let _ = writeln!(out, "{} = {}", key, value);
            }
        }
        let _ = writeln!(out, "invert_ready = {}", self.invert_ready);
        let _ = writeln!(out, "b_series = {}", self.b_series);
        if let Some(timeout) = self.ready_timeout {
            let _ = writeln!(out, "ready_timeout_us = {}", timeout.as_micros());
        }
        out
    }
}

/// A configuration file: optional device path plus the device parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub device: Option<PathBuf>,
    pub config: DeviceConfiguration,
}

/// TOML file structure
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlFile {
    spi: TomlSpi,
}

/// `[spi]` table
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlSpi {
    device: Option<PathBuf>,
    #[serde(default, deserialize_with = "deserialize_opt_number")]
    mode: Option<i64>,
    chip_select: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_number")]
    bits_per_word: Option<i64>,
    lsb_first: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_number")]
    max_speed_hz: Option<i64>,
    half_duplex: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_number")]
    delay_usecs: Option<i64>,
    loopback: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_number")]
    write_pin: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_number")]
    ready_pin: Option<i64>,
    invert_ready: Option<bool>,
    b_series: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_number")]
    ready_timeout_us: Option<i64>,
}

/// Deserialize an optional integer that can be hex (0x...) or decimal
fn deserialize_opt_number<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(i64),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(Some(n)),
        HexOrInt::Str(s) => match Value::parse(&s) {
            Some(Value::Int(n)) => Ok(Some(n)),
            _ => Err(serde::de::Error::custom(format!("invalid number: {}", s))),
        },
    }
}

impl ConfigFile {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string
    ///
    /// Every value goes through the same validation as the field setters.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlFile =
            toml::from_str(content).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let spi = file.spi;
        let mut config = DeviceConfiguration::default();

        if let Some(mode) = spi.mode {
            config.set(Field::Mode, mode)?;
        }
        if let Some(name) = &spi.chip_select {
            let cs = ChipSelect::from_name(name)
                .ok_or_else(|| Error::InvalidConfig(format!("unknown chip_select '{}'", name)))?;
            config.set(Field::ChipSelect, cs.selector())?;
        }
        let ints = [
            (Field::BitsPerWord, spi.bits_per_word),
            (Field::MaxSpeed, spi.max_speed_hz),
            (Field::Delay, spi.delay_usecs),
            (Field::WritePin, spi.write_pin),
            (Field::ReadyPin, spi.ready_pin),
        ];
        for (field, value) in ints {
            if let Some(v) = value {
                config.set(field, v)?;
            }
        }
        let flags = [
            (Field::BitOrder, spi.lsb_first),
            (Field::HalfDuplex, spi.half_duplex),
            (Field::Loopback, spi.loopback),
            (Field::InvertReady, spi.invert_ready),
            (Field::BSeries, spi.b_series),
        ];
        for (field, value) in flags {
            if let Some(b) = value {
                config.set(field, b)?;
            }
        }
        if let Some(us) = spi.ready_timeout_us {
            if us <= 0 {
                return Err(Error::InvalidConfig(format!(
                    "ready_timeout_us must be greater than 0 but was {}",
                    us
                )));
            }
            config.set_ready_timeout(Some(Duration::from_micros(us as u64)));
        }

        Ok(Self {
            device: spi.device,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mode::{CS_HIGH, MODE_1, MODE_3, NO_CS};

    #[test]
    fn test_defaults() {
        let config = DeviceConfiguration::default();
        assert_eq!(config.get(Field::MaxSpeed), Value::Int(1_000_000));
        assert_eq!(config.get(Field::BitsPerWord), Value::Int(8));
        assert_eq!(config.get(Field::Mode), Value::Int(0));
        assert_eq!(config.get(Field::InvertReady), Value::Bool(false));
        assert!(config.ready_level());
        assert_eq!(config.ready_timeout(), None);
    }

    #[test]
    fn test_positive_fields_round_trip() {
        let mut config = DeviceConfiguration::default();
        for (field, value) in [
            (Field::MaxSpeed, 4_000_000),
            (Field::BitsPerWord, 16),
            (Field::Delay, 20),
            (Field::WritePin, 17),
            (Field::ReadyPin, 27),
        ] {
            assert!(config.set(field, 0).is_err());
            config.set(field, value).unwrap();
            assert_eq!(config.get(field), Value::Int(value));
            assert_eq!(config.get(field), config.get(field));
        }
    }

    #[test]
    fn test_mode_replaces_word() {
        let mut config = DeviceConfiguration::default();
        config.set(Field::ChipSelect, CS_HIGH).unwrap();
        config.set(Field::Loopback, true).unwrap();
        config.set(Field::Mode, MODE_3).unwrap();
        assert_eq!(config.mode().bits(), MODE_3);
        assert_eq!(config.get(Field::Loopback), Value::Bool(false));
    }

    #[test]
    fn test_clock_mode_keeps_toggles() {
        let mut config = DeviceConfiguration::default();
        config.set(Field::Mode, MODE_3).unwrap();
        config.set(Field::ChipSelect, CS_HIGH).unwrap();
        config.set(Field::BitOrder, true).unwrap();
        config.set_clock_mode(MODE_1).unwrap();
        assert_eq!(config.mode(), SpiMode::CPHA | SpiMode::CS_HIGH | SpiMode::LSB_FIRST);
        assert!(config.set_clock_mode(4).is_err());
        assert_eq!(config.chip_select(), ChipSelect::ActiveHigh);
    }

    #[test]
    fn test_chip_select_getter_masks() {
        let mut config = DeviceConfiguration::default();
        config.set(Field::Mode, MODE_1).unwrap();
        config.set(Field::ChipSelect, NO_CS).unwrap();
        assert_eq!(config.get(Field::ChipSelect), Value::Int(NO_CS as i64));
        config.set(Field::ChipSelect, 0).unwrap();
        assert_eq!(config.get(Field::ChipSelect), Value::Int(0));
        assert_eq!(config.mode().bits(), MODE_1);
    }

    #[test]
    fn test_toggles() {
        let mut config = DeviceConfiguration::default();
        config.set(Field::BitOrder, true).unwrap();
        config.set(Field::HalfDuplex, true).unwrap();
        assert!(config.mode().contains(SpiMode::LSB_FIRST | SpiMode::THREE_WIRE));
        config.set(Field::BitOrder, false).unwrap();
        assert!(!config.mode().contains(SpiMode::LSB_FIRST));
        assert!(config.set(Field::BitOrder, 1).is_err());
    }

    #[test]
    fn test_from_toml() {
        let file = ConfigFile::from_toml_str(
            r#"
            [spi]
            device = "/dev/spidev0.0"
            mode = 1
            chip_select = "high"
            max_speed_hz = "0x1E8480"
            write_pin = 17
            ready_pin = 27
            invert_ready = true
            ready_timeout_us = 250000
            "#,
        )
        .unwrap();
        assert_eq!(file.device, Some(PathBuf::from("/dev/spidev0.0")));
        let config = file.config;
        assert_eq!(config.max_speed_hz(), 2_000_000);
        assert_eq!(config.chip_select(), ChipSelect::ActiveHigh);
        assert!(config.mode().contains(SpiMode::CPHA));
        assert_eq!(config.write_pin(), 17);
        assert!(config.invert_ready());
        assert_eq!(config.ready_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        let err = ConfigFile::from_toml_str("[spi]\nmax_speed_hz = 0\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        let err = ConfigFile::from_toml_str("[spi]\nmode = 7\n").unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
        let err = ConfigFile::from_toml_str("[spi]\nspeed = 1\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        let err = ConfigFile::from_toml_str("[spi]\nchip_select = \"sideways\"\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_toml_output_parses_back() {
        let mut config = DeviceConfiguration::default();
        config
            .set(Field::Mode, MODE_3)
            .and_then(|c| c.set(Field::ChipSelect, NO_CS))
            .and_then(|c| c.set(Field::ReadyPin, 27))
            .unwrap();
        config.set_ready_timeout(Some(Duration::from_micros(1000)));
        let text = config.to_toml_string(Some(Path::new("/dev/spidev1.0")));
        let file = ConfigFile::from_toml_str(&text).unwrap();
        assert_eq!(file.config, config);
        assert_eq!(file.device, Some(PathBuf::from("/dev/spidev1.0")));
    }

    #[test]
    fn test_toml_output_escapes_device_path() {
        let config = DeviceConfiguration::default();
        let device = Path::new(r#"/tmp/odd "node"\spidev0.0"#);
        let text = config.to_toml_string(Some(device));
        let file = ConfigFile::from_toml_str(&text).unwrap();
        assert_eq!(file.device.as_deref(), Some(device));
    }
}
