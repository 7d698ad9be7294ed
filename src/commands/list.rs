//! List commands implementation

use super::DriverSelection;
use crate::drivers;
use jflasher_core::loader;

/// List all compiled-in driver backends
pub fn list_drivers() {
    let available = drivers::available_drivers();
    if available.is_empty() {
        println!("No driver backends available (recompile with a driver feature enabled)");
        return;
    }

    println!("Available driver backends:");
    println!();
    for d in &available {
        let aliases = if d.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", d.aliases.join(", "))
        };
        println!("  {:<10} - {}{}", d.name, d.description, aliases);
    }
}

/// Enumerate the probes the selected driver can see
pub fn list_probes(selection: &DriverSelection) -> Result<(), Box<dyn std::error::Error>> {
    let library = drivers::open_library(selection.backend.as_deref())?;
    let mut handle = loader::load(library.as_ref(), selection.primary(), selection.backup())?;

    let probes = handle.driver_mut().enumerate_probes()?;
    if probes.is_empty() {
        println!("No probes found");
        return Ok(());
    }

    println!("{:<4} {:<12} {:<24} Nickname", "#", "Serial", "Product");
    println!("{}", "-".repeat(56));
    for (i, probe) in probes.iter().enumerate() {
        println!(
            "{:<4} {:<12} {:<24} {}",
            i,
            probe.serial_number,
            probe.product,
            probe.nickname.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
