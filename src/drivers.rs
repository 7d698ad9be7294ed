//! Driver backend registration
//!
//! Backends are compiled in behind cargo features. Each one provides a
//! [`DriverLibrary`] the loader can pull a probe driver from.

use jflasher_core::driver::DriverLibrary;
use std::path::PathBuf;
use thiserror::Error;

/// Information about a driver backend
pub struct DriverInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Errors the CLI reports on its own behalf
#[derive(Error, Debug)]
pub enum CliError {
    /// Backend name not compiled in
    #[error("unknown driver '{name}' (available: {available})")]
    UnknownDriver {
        /// Requested name
        name: String,
        /// Names that would have worked
        available: String,
    },

    /// Neither `--driver` nor `[driver] backend` was given
    #[error("no driver backend selected; pass --driver or set [driver] backend (available: {available})")]
    NoDriverSelected {
        /// Names that would have worked
        available: String,
    },

    /// Script ran but a step failed
    #[error("script {0} failed")]
    ScriptFailed(PathBuf),
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_drivers() -> Vec<DriverInfo> {
    let mut drivers = Vec::new();

    #[cfg(feature = "dummy")]
    drivers.push(DriverInfo {
        name: "dummy",
        aliases: &["emulated"],
        description: "Emulated probe and in-memory target flash for testing",
    });

    drivers
}

/// Comma-separated backend names for help and error text
pub fn driver_names_short() -> String {
    let names: Vec<&str> = available_drivers().iter().map(|d| d.name).collect();
    names.join(", ")
}

/// Resolve a backend name or alias to its primary name
pub fn find_driver(name: &str) -> Option<&'static str> {
    available_drivers()
        .into_iter()
        .find(|d| d.name == name || d.aliases.contains(&name))
        .map(|d| d.name)
}

/// Create the driver library for the named backend
///
/// There is no default backend: a run against the emulator has to be asked
/// for by name, so a bench setup never flashes an in-memory target by mistake.
pub fn open_library(name: Option<&str>) -> Result<Box<dyn DriverLibrary>, CliError> {
    let name = name.ok_or_else(|| CliError::NoDriverSelected {
        available: driver_names_short(),
    })?;
    let canonical = find_driver(name).ok_or_else(|| CliError::UnknownDriver {
        name: name.to_string(),
        available: driver_names_short(),
    })?;
    log::debug!("Using driver backend '{}'", canonical);

    match canonical {
        #[cfg(feature = "dummy")]
        "dummy" => {
            log::warn!("Driver backend 'dummy': the probe and target are emulated, nothing is flashed");
            Ok(Box::new(
                jflasher_dummy::DummyLibrary::new(jflasher_dummy::DummyConfig::default())
                    .with_installed(true),
            ))
        }
        _ => Err(CliError::UnknownDriver {
            name: canonical.to_string(),
            available: driver_names_short(),
        }),
    }
}
