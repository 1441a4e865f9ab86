//! Configuration field descriptors
//!
//! Every configurable property of a device is described once in [`FIELDS`]:
//! its public name, the kind of value it takes, the accepted range and
//! whether it may change while the device is open. A single accessor in
//! [`crate::device`] is driven by this table, so all fields share the same
//! get/set contract.

use core::fmt;

use crate::error::{Error, Result};
use crate::gpio::GPIO_COUNT;
use crate::mode::MODES;

/// Kind of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// Signed integer
    Int,
    /// Boolean flag
    Bool,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "an integer"),
            Self::Bool => write!(f, "a boolean"),
        }
    }
}

/// Tagged configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl Value {
    /// Kind of this value
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Int(_) => ArgKind::Int,
            Self::Bool(_) => ArgKind::Bool,
        }
    }

    /// Integer payload, if any
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Bool(_) => None,
        }
    }

    /// Boolean payload, if any
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            Self::Int(_) => None,
        }
    }

    /// Parse a command line value: `true`/`false`, decimal or `0x` hex
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "true" => return Some(Self::Bool(true)),
            "false" => return Some(Self::Bool(false)),
            _ => {}
        }
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).ok().map(Self::Int)
        } else {
            s.parse().ok().map(Self::Int)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Int(v as i64)
            }
        })*
    };
}

value_from_int!(i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Accepted range of an integer field
#[derive(Debug, Clone, Copy)]
pub enum Range {
    /// Any integer
    Any,
    /// Strictly positive, at most `max`
    Positive { max: i64 },
    /// Exactly one of the listed values
    OneOf(&'static [u32]),
}

impl Range {
    /// Check `value`, returning the violated requirement on failure
    pub fn check(&self, value: i64) -> core::result::Result<(), &'static str> {
        match *self {
            Range::Any => Ok(()),
            Range::Positive { .. } if value <= 0 => Err("greater than 0"),
            Range::Positive { max } if value > max => Err("within the field's range"),
            Range::Positive { .. } => Ok(()),
            Range::OneOf(values) if values.iter().any(|&v| v as i64 == value) => Ok(()),
            Range::OneOf(_) => Err("one of the SPI_MODE_X constants"),
        }
    }
}

/// A configurable device property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Mode,
    ChipSelect,
    BitsPerWord,
    BitOrder,
    MaxSpeed,
    HalfDuplex,
    Delay,
    Loopback,
    WritePin,
    ReadyPin,
    InvertReady,
    BSeries,
}

/// Static description of a [`Field`]
#[derive(Debug)]
pub struct FieldDescriptor {
    pub field: Field,
    /// Public name
    pub name: &'static str,
    pub kind: ArgKind,
    pub range: Range,
    /// Whether the field may change while the device is open
    pub mutable_while_open: bool,
    pub help: &'static str,
}

/// Highest valid BCM GPIO number
const MAX_PIN: i64 = GPIO_COUNT as i64 - 1;

/// Descriptor table, indexed by `Field as usize`
pub static FIELDS: [FieldDescriptor; 12] = [
    FieldDescriptor {
        field: Field::Mode,
        name: "mode",
        kind: ArgKind::Int,
        range: Range::OneOf(&MODES),
        mutable_while_open: false,
        help: "SPI clock mode (0-3); replaces the whole mode word",
    },
    FieldDescriptor {
        field: Field::ChipSelect,
        name: "chipSelect",
        kind: ArgKind::Int,
        range: Range::Any,
        mutable_while_open: false,
        help: "chip select polarity (CS_HIGH=4, NO_CS=64, otherwise active low)",
    },
    FieldDescriptor {
        field: Field::BitsPerWord,
        name: "size",
        kind: ArgKind::Int,
        range: Range::Positive { max: u8::MAX as i64 },
        mutable_while_open: false,
        help: "bits per word",
    },
    FieldDescriptor {
        field: Field::BitOrder,
        name: "bitOrder",
        kind: ArgKind::Bool,
        range: Range::Any,
        mutable_while_open: false,
        help: "least significant bit first when true",
    },
    FieldDescriptor {
        field: Field::MaxSpeed,
        name: "maxSpeed",
        kind: ArgKind::Int,
        range: Range::Positive { max: u32::MAX as i64 },
        mutable_while_open: false,
        help: "bus clock in Hz",
    },
    FieldDescriptor {
        field: Field::HalfDuplex,
        name: "halfDuplex",
        kind: ArgKind::Bool,
        range: Range::Any,
        mutable_while_open: false,
        help: "3-wire mode",
    },
    FieldDescriptor {
        field: Field::Delay,
        name: "delay",
        kind: ArgKind::Int,
        range: Range::Positive { max: u16::MAX as i64 },
        mutable_while_open: false,
        help: "delay after each message in microseconds, applied by the driver",
    },
    FieldDescriptor {
        field: Field::Loopback,
        name: "loopback",
        kind: ArgKind::Bool,
        range: Range::Any,
        mutable_while_open: false,
        help: "loopback mode",
    },
    FieldDescriptor {
        field: Field::WritePin,
        name: "wrPin",
        kind: ArgKind::Int,
        range: Range::Positive { max: MAX_PIN },
        mutable_while_open: false,
        help: "GPIO number of the write strobe output",
    },
    FieldDescriptor {
        field: Field::ReadyPin,
        name: "rdyPin",
        kind: ArgKind::Int,
        range: Range::Positive { max: MAX_PIN },
        mutable_while_open: false,
        help: "GPIO number of the ready/busy input",
    },
    FieldDescriptor {
        field: Field::InvertReady,
        name: "invertRdy",
        kind: ArgKind::Bool,
        range: Range::Any,
        mutable_while_open: true,
        help: "ready pin is a busy pin (low means ready)",
    },
    FieldDescriptor {
        field: Field::BSeries,
        name: "bSeries",
        kind: ArgKind::Bool,
        range: Range::Any,
        mutable_while_open: true,
        help: "device family flag for callers; not used by the transfer engine",
    },
];

impl Field {
    /// All fields in table order
    pub const ALL: [Field; 12] = [
        Field::Mode,
        Field::ChipSelect,
        Field::BitsPerWord,
        Field::BitOrder,
        Field::MaxSpeed,
        Field::HalfDuplex,
        Field::Delay,
        Field::Loopback,
        Field::WritePin,
        Field::ReadyPin,
        Field::InvertReady,
        Field::BSeries,
    ];

    /// Descriptor for this field
    pub fn descriptor(self) -> &'static FieldDescriptor {
        &FIELDS[self as usize]
    }

    /// Public name
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Look a field up by its public name (case-insensitive)
    pub fn from_name(name: &str) -> Result<Field> {
        FIELDS
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .map(|d| d.field)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validate `value` against the field's kind and range
pub fn extract(field: Field, value: Value) -> Result<Value> {
    let desc = field.descriptor();
    if value.kind() != desc.kind {
        return Err(Error::WrongKind {
            field,
            expected: desc.kind,
            got: value.kind(),
        });
    }
    if let Value::Int(v) = value {
        desc.range.check(v).map_err(|requirement| Error::OutOfRange {
            field,
            requirement,
            value: v,
        })?;
    }
    Ok(value)
}
