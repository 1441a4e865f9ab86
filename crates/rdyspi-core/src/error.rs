//! Error types for rdyspi-core
//!
//! Every failure carries enough context to tell its category apart through
//! [`Error::kind`], so callers can decide whether to reconfigure, retry or
//! give up.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::field::{ArgKind, Field};

/// Broad category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong argument kind or out-of-range value
    Argument,
    /// Operation not valid for the current open/closed state
    State,
    /// Transfer buffers do not describe a valid stream
    Protocol,
    /// Device node, kernel driver or register mapping failure
    Io,
    /// The peer did not reach the ready level in time
    Timeout,
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Value has the wrong kind for the field
    #[error("{field} must be {expected} but was {got}")]
    WrongKind {
        field: Field,
        expected: ArgKind,
        got: ArgKind,
    },

    /// Value is outside the accepted range
    #[error("{field} must be {requirement} but was {value}")]
    OutOfRange {
        field: Field,
        requirement: &'static str,
        value: i64,
    },

    /// No field with this name
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// Configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Field is locked while the device is open
    #[error("{field} cannot be called once device is opened")]
    LockedWhileOpen { field: Field },

    /// `open` called on an open device
    #[error("device already opened ({})", path.display())]
    AlreadyOpen { path: PathBuf },

    /// Operation requires an open device
    #[error("device not opened")]
    NotOpen,

    /// Neither a write nor a read buffer was given
    #[error("both buffers cannot be null")]
    NoBuffers,

    /// Both buffers are non-empty but differ in length
    #[error("read and write buffers must be the same length (write {write}, read {read})")]
    LengthMismatch { write: usize, read: usize },

    /// Device node could not be opened
    #[error("unable to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A kernel bus configuration call failed
    #[error("unable to set {item} to {value}: {source}")]
    ConfigureFailed {
        item: &'static str,
        value: u32,
        #[source]
        source: std::io::Error,
    },

    /// GPIO register block could not be mapped
    #[error("failed to map GPIO registers at {address:#x} (size {size}): {source}")]
    MemoryMap {
        address: u64,
        size: usize,
        #[source]
        source: std::io::Error,
    },

    /// A per-byte SPI message failed
    #[error("unable to send message (byte {index}): {source}")]
    TransferFailed {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be read
    #[error("failed to read {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ready pin stayed busy past the configured bound
    #[error("ready pin {pin} not {level} after {timeout:?}")]
    ReadyTimeout {
        pin: u32,
        level: &'static str,
        timeout: Duration,
    },
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongKind { .. }
            | Self::OutOfRange { .. }
            | Self::UnknownField(_)
            | Self::InvalidConfig(_) => ErrorKind::Argument,
            Self::LockedWhileOpen { .. } | Self::AlreadyOpen { .. } | Self::NotOpen => {
                ErrorKind::State
            }
            Self::NoBuffers | Self::LengthMismatch { .. } => ErrorKind::Protocol,
            Self::OpenFailed { .. }
            | Self::ConfigureFailed { .. }
            | Self::MemoryMap { .. }
            | Self::TransferFailed { .. }
            | Self::ConfigRead { .. } => ErrorKind::Io,
            Self::ReadyTimeout { .. } => ErrorKind::Timeout,
        }
    }
}

/// Result type for rdyspi operations
pub type Result<T> = std::result::Result<T, Error>;
