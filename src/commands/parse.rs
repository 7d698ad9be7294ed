//! `parse` command: show what a script would do

use jflasher_core::dispatch::extract_parameters;
use jflasher_core::script::Script;
use std::path::Path;

/// Print the parsed commands and the connection parameters they yield
pub fn parse_script(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let script = Script::from_file(path)?;

    println!("{}: {} command(s)", path.display(), script.len());
    println!();
    for (i, cmd) in script.commands().iter().enumerate() {
        let marker = if cmd.name().is_connection_parameter() {
            "*"
        } else {
            " "
        };
        println!("{:>4} {} {}", i + 1, marker, cmd);
    }

    let params = extract_parameters(script.commands(), None)?;
    println!();
    println!("Connection (* marks parameters applied before connecting):");
    println!("  Interface: {}", params.interface);
    println!("  Speed:     {} kHz", params.speed);
    if params.chip_name.is_empty() {
        println!("  Device:    (none)");
    } else {
        println!("  Device:    {}", params.chip_name);
    }

    Ok(())
}
