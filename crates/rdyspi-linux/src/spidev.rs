//! spidev bus node
//!
//! [`Spidev`] implements [`SpiBus`] over `/dev/spidevX.Y`. Configuration
//! items go through the `SPI_IOC_WR_*` requests and every message is a
//! single `spi_ioc_transfer` submitted with `SPI_IOC_MESSAGE(1)`.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use rdyspi_core::{BusSetting, SpiBus, SpiMessage};

use crate::error::{LinuxError, Result};

use self::ioctl::SpiIocTransfer;

/// Linux spidev ioctl constants
mod ioctl {
    use nix::{ioctl_write_buf, ioctl_write_ptr};

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MESSAGE: u8 = 0;
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    // SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(spi_ioc_transfer)])
    ioctl_write_buf!(
        spi_ioc_message,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MESSAGE,
        SpiIocTransfer
    );

    /// SPI transfer structure for ioctl
    /// This must match the kernel's struct spi_ioc_transfer layout
    #[repr(C)]
    #[derive(Debug, Default, Clone)]
    pub struct SpiIocTransfer {
        pub tx_buf: u64,          // __u64 tx_buf
        pub rx_buf: u64,          // __u64 rx_buf
        pub len: u32,             // __u32 len
        pub speed_hz: u32,        // __u32 speed_hz
        pub delay_usecs: u16,     // __u16 delay_usecs
        pub bits_per_word: u8,    // __u8 bits_per_word
        pub cs_change: u8,        // __u8 cs_change
        pub tx_nbits: u8,         // __u8 tx_nbits
        pub rx_nbits: u8,         // __u8 rx_nbits
        pub word_delay_usecs: u8, // __u8 word_delay_usecs
        pub _pad: u8,             // padding
    }
}

impl SpiIocTransfer {
    /// One-unit transfer for `msg`; missing buffers become null pointers
    fn single(msg: &mut SpiMessage<'_>) -> Self {
        Self {
            tx_buf: msg.tx.map_or(0, |b| b as *const u8 as u64),
            rx_buf: msg.rx.as_deref_mut().map_or(0, |b| b as *mut u8 as u64),
            len: 1,
            speed_hz: msg.speed_hz,
            delay_usecs: msg.delay_usecs,
            bits_per_word: msg.bits_per_word,
            ..Default::default()
        }
    }
}

fn errno(e: nix::errno::Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(e as i32)
}

/// An open spidev node
///
/// The descriptor is closed when the value is dropped.
pub struct Spidev {
    file: File,
    path: PathBuf,
}

impl Spidev {
    /// Open `path` for blocking read/write
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("spidev: Opening {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| LinuxError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl SpiBus for Spidev {
    fn configure(&mut self, setting: BusSetting) -> std::io::Result<()> {
        let fd = self.file.as_raw_fd();
        match setting {
            BusSetting::Mode(mode) => {
                // Every mode bit the device exposes fits the 8-bit request
                let mode = mode.bits() as u8;
                unsafe { ioctl::spi_ioc_wr_mode(fd, &mode) }.map_err(errno)?;
            }
            BusSetting::BitsPerWord(bits) => {
                unsafe { ioctl::spi_ioc_wr_bits_per_word(fd, &bits) }.map_err(errno)?;
            }
            BusSetting::MaxSpeed(speed) => {
                unsafe { ioctl::spi_ioc_wr_max_speed_hz(fd, &speed) }.map_err(errno)?;
            }
        }
        log::debug!(
            "spidev: {} = {:#x} on {}",
            setting.name(),
            setting.value(),
            self.path.display()
        );
        Ok(())
    }

    fn message(&mut self, msg: &mut SpiMessage<'_>) -> std::io::Result<i32> {
        let xfer = [SpiIocTransfer::single(msg)];
        // The transfer points into `msg`, which outlives the call
        unsafe { ioctl::spi_ioc_message(self.file.as_raw_fd(), &xfer) }.map_err(errno)
    }
}

impl Drop for Spidev {
    fn drop(&mut self) {
        log::debug!("spidev: Closing {}", self.path.display());
    }
}
