//! Show command implementation

use std::error::Error;

use crate::cli::DeviceArgs;
use crate::commands::resolve_config;

/// Print the resolved configuration in the config file format
pub fn run_show(args: &DeviceArgs) -> Result<(), Box<dyn Error>> {
    let (path, config) = resolve_config(args)?;
    print!("{}", config.to_toml_string(path.as_deref()));
    Ok(())
}
