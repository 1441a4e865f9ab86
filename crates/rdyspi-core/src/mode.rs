//! SPI bus mode word and exported selector constants
//!
//! The bit values match `linux/spi/spidev.h` so the mode word can be handed
//! to `SPI_IOC_WR_MODE` unchanged.

use bitflags::bitflags;

bitflags! {
    /// Mode bits understood by the spidev driver
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpiMode: u32 {
        /// Clock phase
        const CPHA       = 0x01;
        /// Clock polarity
        const CPOL       = 0x02;
        /// Chip select is active high
        const CS_HIGH    = 0x04;
        /// Shift out the least significant bit first
        const LSB_FIRST  = 0x08;
        /// SI/SO share one line (half duplex)
        const THREE_WIRE = 0x10;
        /// Loopback
        const LOOP       = 0x20;
        /// No chip select line
        const NO_CS      = 0x40;
    }
}

/// SPI mode 0: CPOL=0, CPHA=0
pub const MODE_0: u32 = 0;
/// SPI mode 1: CPOL=0, CPHA=1
pub const MODE_1: u32 = SpiMode::CPHA.bits();
/// SPI mode 2: CPOL=1, CPHA=0
pub const MODE_2: u32 = SpiMode::CPOL.bits();
/// SPI mode 3: CPOL=1, CPHA=1
pub const MODE_3: u32 = SpiMode::CPOL.bits() | SpiMode::CPHA.bits();

/// Chip select selector: active high
pub const CS_HIGH: u32 = SpiMode::CS_HIGH.bits();
/// Chip select selector: no chip select
pub const NO_CS: u32 = SpiMode::NO_CS.bits();
/// Chip select selector: active low (the driver default)
pub const CS_LOW: u32 = 0;

/// Bit order selector: most significant bit first
pub const MSB_FIRST: bool = false;
/// Bit order selector: least significant bit first
pub const LSB_FIRST: bool = true;

/// The four canonical clock modes
pub const MODES: [u32; 4] = [MODE_0, MODE_1, MODE_2, MODE_3];

/// Chip select polarity, derived from the `CS_HIGH` and `NO_CS` bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChipSelect {
    /// Active low chip select
    #[default]
    ActiveLow,
    /// Active high chip select
    ActiveHigh,
    /// No chip select line
    None,
}

impl ChipSelect {
    /// Map a selector value to a polarity
    ///
    /// Anything other than `CS_HIGH` or `NO_CS` selects the normal,
    /// active low behaviour.
    pub fn from_selector(value: i64) -> Self {
        match value {
            v if v == CS_HIGH as i64 => Self::ActiveHigh,
            v if v == NO_CS as i64 => Self::None,
            _ => Self::ActiveLow,
        }
    }

    /// Read the polarity out of a mode word
    pub fn from_mode(mode: SpiMode) -> Self {
        if mode.contains(SpiMode::NO_CS) {
            Self::None
        } else if mode.contains(SpiMode::CS_HIGH) {
            Self::ActiveHigh
        } else {
            Self::ActiveLow
        }
    }

    /// Selector value of this polarity
    pub fn selector(self) -> u32 {
        match self {
            Self::ActiveLow => CS_LOW,
            Self::ActiveHigh => CS_HIGH,
            Self::None => NO_CS,
        }
    }

    /// Apply this polarity to a mode word
    pub fn apply(self, mode: &mut SpiMode) {
        match self {
            Self::ActiveHigh => {
                mode.insert(SpiMode::CS_HIGH);
                mode.remove(SpiMode::NO_CS);
            }
            Self::None => {
                mode.insert(SpiMode::NO_CS);
                mode.remove(SpiMode::CS_HIGH);
            }
            Self::ActiveLow => mode.remove(SpiMode::NO_CS | SpiMode::CS_HIGH),
        }
    }

    /// Short name used in configuration files
    pub fn name(self) -> &'static str {
        match self {
            Self::ActiveLow => "low",
            Self::ActiveHigh => "high",
            Self::None => "none",
        }
    }

    /// Parse a configuration file name (`low`, `high`, `none`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "low" => Some(Self::ActiveLow),
            "high" => Some(Self::ActiveHigh),
            "none" | "no_cs" => Some(Self::None),
            _ => None,
        }
    }
}
