//! CLI command implementations
//!
//! Every command starts from the same resolved configuration: the TOML file
//! given with `--config` (if any), then the dedicated flags, then each
//! `--set NAME=VALUE` in order. All values go through the device's
//! validating setters, so a bad value is reported before any I/O happens.
//! A mode given on the command line replaces the clock mode only; chip
//! select and the toggles from the file stay.

mod fields;
pub mod send;
pub mod show;
pub mod transfer;

pub use fields::{list_backends, list_fields};

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use rdyspi_core::{ConfigFile, DeviceConfiguration, Field, Value};

use crate::cli::DeviceArgs;

/// Resolve the bus node path and configuration from the command line
pub fn resolve_config(
    args: &DeviceArgs,
) -> Result<(Option<PathBuf>, DeviceConfiguration), Box<dyn Error>> {
    let (file_device, mut config) = match &args.config {
        Some(path) => {
            let file = ConfigFile::from_toml_file(path)?;
            log::debug!("Loaded configuration from {}", path.display());
            (file.device, file.config)
        }
        None => (None, DeviceConfiguration::default()),
    };

    if let Some(mode) = args.mode {
        config.set_clock_mode(mode)?;
    }
    if let Some(speed) = args.speed {
        config.set(Field::MaxSpeed, speed)?;
    }
    if let Some(pin) = args.wr_pin {
        config.set(Field::WritePin, pin)?;
    }
    if let Some(pin) = args.rdy_pin {
        config.set(Field::ReadyPin, pin)?;
    }
    if args.invert_rdy {
        config.set(Field::InvertReady, true)?;
    }
    if let Some(us) = args.timeout_us {
        config.set_ready_timeout(Some(Duration::from_micros(us)));
    }

    for (name, raw) in &args.set {
        let field = Field::from_name(name)?;
        let value = Value::parse(raw)
            .ok_or_else(|| format!("Invalid value '{}' for {}", raw, field))?;
        // Layered over a file, mode only picks the clock mode
        if field == Field::Mode {
            config.set_clock_mode(value)?;
        } else {
            config.set(field, value)?;
        }
    }

    Ok((args.device.clone().or(file_device), config))
}

/// Format bytes as space separated hex
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
