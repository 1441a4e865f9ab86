//! Send command implementation

use std::error::Error;
use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rdyspi_core::{Device, Platform};

use crate::backends::{self, DeviceAction};
use crate::cli::DeviceArgs;

/// Stream a buffer in fixed-size transfers
pub struct Stream {
    pub data: Vec<u8>,
    pub chunk: usize,
    /// Keep the bytes clocked in during the stream
    pub capture: bool,
}

impl DeviceAction for Stream {
    type Output = Vec<u8>;

    fn run<P: Platform>(self, device: &mut Device<P>) -> Result<Vec<u8>, Box<dyn Error>> {
        let total = self.data.len();
        let mut received = if self.capture {
            vec![0u8; total]
        } else {
            Vec::new()
        };

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
                .progress_chars("#>-"),
        );

        let mut offset = 0usize;
        while offset < total {
            let chunk_size = std::cmp::min(self.chunk, total - offset);
            let write = &self.data[offset..offset + chunk_size];
            let read = if self.capture {
                Some(&mut received[offset..offset + chunk_size])
            } else {
                None
            };

            if let Err(e) = device.transfer(Some(write), read) {
                pb.abandon_with_message("Send failed");
                return Err(format!("at offset {:#x}: {}", offset, e).into());
            }

            offset += chunk_size;
            pb.set_position(offset as u64);
        }

        pb.finish_with_message("Send complete");
        Ok(received)
    }
}

/// Run the send command
pub fn run_send(
    args: &DeviceArgs,
    input: &Path,
    output: Option<&Path>,
    chunk: usize,
) -> Result<(), Box<dyn Error>> {
    let data = fs::read(input)?;
    if data.is_empty() {
        return Err(format!("{} is empty", input.display()).into());
    }
    println!("Sending {} bytes from {:?}", data.len(), input);

    let received = backends::run(
        args,
        Stream {
            data,
            chunk,
            capture: output.is_some(),
        },
    )?;

    if let Some(output) = output {
        fs::write(output, &received)?;
        println!("Wrote {} received bytes to {:?}", received.len(), output);
    }

    Ok(())
}
