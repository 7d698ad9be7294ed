//! `info` command: platform and driver library details

use super::DriverSelection;
use crate::drivers;
use jflasher_core::loader;
use jflasher_core::platform::{self, Platform};

/// Print where a J-Link library is expected and which one actually loads
pub fn show_info(selection: &DriverSelection) -> Result<(), Box<dyn std::error::Error>> {
    let platform = Platform::current();
    let dirs = platform.default_library_dirs();

    println!("Platform Information:");
    println!("  OS:              {}", platform);
    println!("  Driver library:  {}", platform.driver_library_name());
    println!("  Commander:       {}", platform.commander_executable());
    println!("  Search dirs:");
    for dir in &dirs {
        println!("    {}", dir.display());
    }
    match platform::locate_installed_library(platform, &dirs) {
        Some(path) => println!("  Installed:       {}", path.display()),
        None => println!("  Installed:       (not found)"),
    }

    println!();
    println!("Driver:");
    let library = drivers::open_library(selection.backend.as_deref())?;
    match loader::load(library.as_ref(), selection.primary(), selection.backup()) {
        Ok(handle) => {
            let driver = handle.driver();
            println!("  Source:          {}", handle.source());
            println!("  Version:         {}", driver.version());
            match driver.library_path() {
                Some(path) => println!("  Library:         {}", path.display()),
                None => println!("  Library:         (unknown)"),
            }
        }
        Err(e) => {
            println!("  Not loaded: {}", e);
            for (source, err) in &e.failures {
                println!("    {}: {}", source, err);
            }
        }
    }

    Ok(())
}
