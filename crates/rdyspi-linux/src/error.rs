//! Error types for the Linux backend

use std::path::PathBuf;

use thiserror::Error;

/// Linux backend errors
#[derive(Debug, Error)]
pub enum LinuxError {
    /// Failed to open the bus node
    #[error("Failed to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to map the GPIO block
    #[error("Failed to map {size} bytes of physical memory at {address:#x}: {source}")]
    MemoryMap {
        address: u64,
        size: usize,
        #[source]
        source: std::io::Error,
    },

    /// Physical memory access is not available on this target
    #[error("Not supported: {0}")]
    NotSupported(&'static str),
}

/// Result type for Linux backend operations
pub type Result<T> = std::result::Result<T, LinuxError>;

impl From<LinuxError> for rdyspi_core::Error {
    fn from(err: LinuxError) -> Self {
        match err {
            LinuxError::OpenFailed { path, source } => Self::OpenFailed { path, source },
            LinuxError::MemoryMap {
                address,
                size,
                source,
            } => Self::MemoryMap {
                address,
                size,
                source,
            },
            LinuxError::NotSupported(what) => Self::MemoryMap {
                address: 0,
                size: 0,
                source: std::io::Error::new(std::io::ErrorKind::Unsupported, what),
            },
        }
    }
}
