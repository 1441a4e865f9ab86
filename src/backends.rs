//! Backend registration and dispatch
//!
//! Backends are feature-gated. Commands describe what to do with an open
//! device as a [`DeviceAction`]; [`run`] resolves the configuration, picks
//! the backend and drives the device through open and close around it.

use std::error::Error;
use std::path::Path;

use rdyspi_core::{Device, Platform};

use crate::cli::DeviceArgs;
use crate::commands;

/// Information about a backend
pub struct BackendInfo {
    /// Name shown to the user
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
}

/// Get information about all backends enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "linux")]
    backends.push(BackendInfo {
        name: "linux",
        description: "spidev bus node with BCM GPIO via /dev/mem (default)",
    });

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        description: "Simulated bus and always-ready peer (--dry-run)",
    });

    backends
}

/// Work done with an open device
pub trait DeviceAction {
    type Output;

    fn run<P: Platform>(self, device: &mut Device<P>) -> Result<Self::Output, Box<dyn Error>>;
}

/// Open the configured device, run `action`, then close the device
pub fn run<A: DeviceAction>(args: &DeviceArgs, action: A) -> Result<A::Output, Box<dyn Error>> {
    let (path, config) = commands::resolve_config(args)?;
    let path =
        path.ok_or("No bus node given. Use --device or set `device` in the config file")?;

    if args.dry_run {
        #[cfg(feature = "dummy")]
        {
            log::info!("Dry run: using the simulated bus");
            let platform =
                rdyspi_dummy::DummyPlatform::with_peer(config.ready_pin(), config.ready_level())
                    .quiet();
            let output = run_with(Device::with_config(platform.clone(), config), &path, action);
            log::info!(
                "Dry run: {} messages, {} strobes",
                platform.message_count(),
                platform.registers().strobes()
            );
            return output;
        }
        #[cfg(not(feature = "dummy"))]
        return Err("Dry run needs the `dummy` feature".into());
    }

    #[cfg(feature = "linux")]
    let result = {
        let result = run_with(
            Device::with_config(rdyspi_linux::LinuxPlatform, config),
            &path,
            action,
        );
        rdyspi_linux::GpioContext::release();
        result
    };
    #[cfg(not(feature = "linux"))]
    let result = Err("No hardware backend compiled in, use --dry-run".into());
    result
}

#[allow(dead_code)]
fn run_with<P: Platform, A: DeviceAction>(
    mut device: Device<P>,
    path: &Path,
    action: A,
) -> Result<A::Output, Box<dyn Error>> {
    device.open(path)?;
    let output = action.run(&mut device);
    device.close();
    output
}
