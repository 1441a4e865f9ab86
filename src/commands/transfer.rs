//! Transfer command implementation

use std::error::Error;

use rdyspi_core::{Device, Platform};

use crate::backends::DeviceAction;
use crate::commands::format_hex;

/// One transfer with optional write bytes and read length
pub struct Transfer {
    pub write: Option<Vec<u8>>,
    pub read: Option<usize>,
}

impl DeviceAction for Transfer {
    type Output = Option<Vec<u8>>;

    fn run<P: Platform>(self, device: &mut Device<P>) -> Result<Self::Output, Box<dyn Error>> {
        let mut read = self.read.map(|len| vec![0u8; len]);
        let status = device.transfer(self.write.as_deref(), read.as_deref_mut())?;
        log::debug!("Transfer status {}", status);
        Ok(read)
    }
}

/// Print the received bytes, if any were requested
pub fn print_received(received: Option<&[u8]>) {
    match received {
        Some(bytes) => println!("{}", format_hex(bytes)),
        None => println!("Transfer complete"),
    }
}
