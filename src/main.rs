//! rdyspi - Handshake-gated SPI transfers
//!
//! Drives SPI peripherals that pace the host with a write strobe and a
//! ready line, one byte at a time, over Linux spidev and the BCM GPIO
//! block.
//!
//! # Architecture
//!
//! - `rdyspi-core` holds the device configuration, the open/closed
//!   lifecycle and the transfer engine
//! - `rdyspi-linux` provides the spidev bus and the `/dev/mem` GPIO context
//! - `rdyspi-dummy` simulates both for `--dry-run` and tests
//!
//! Commands that touch the device are [`backends::DeviceAction`]s, so the
//! same implementation runs on hardware and on the simulated bus.

mod backends;
mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Fields => {
            commands::list_fields();
            Ok(())
        }
        Commands::Backends => {
            commands::list_backends();
            Ok(())
        }
        Commands::Show { args } => commands::show::run_show(&args),
        Commands::Transfer { args, write, read } => {
            let received = backends::run(
                &args,
                commands::transfer::Transfer {
                    write: write.map(|w| w.0),
                    read,
                },
            )?;
            commands::transfer::print_received(received.as_deref());
            Ok(())
        }
        Commands::Send {
            args,
            input,
            output,
            chunk,
        } => commands::send::run_send(&args, &input, output.as_deref(), chunk as usize),
    }
}
