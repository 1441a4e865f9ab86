//! List commands implementation

use rdyspi_core::{DeviceConfiguration, FIELDS};

use crate::backends;

/// List all configurable fields
pub fn list_fields() {
    let defaults = DeviceConfiguration::default();

    println!("{:<12} {:<8} {:>10} {:<6} Description", "Field", "Type", "Default", "Open");
    println!("{}", "-".repeat(78));

    for desc in FIELDS.iter() {
        println!(
            "{:<12} {:<8} {:>10} {:<6} {}",
            desc.name,
            match desc.kind {
                rdyspi_core::ArgKind::Int => "int",
                rdyspi_core::ArgKind::Bool => "bool",
            },
            defaults.get(desc.field).to_string(),
            if desc.mutable_while_open { "yes" } else { "no" },
            desc.help
        );
    }

    println!();
    println!("Fields marked \"no\" can only be changed while the device is closed.");
}

/// List all compiled-in backends
pub fn list_backends() {
    println!("Available backends:");
    println!();
    for backend in backends::available_backends() {
        println!("  {:<8} - {}", backend.name, backend.description);
    }
}
