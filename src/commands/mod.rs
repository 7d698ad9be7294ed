//! CLI command implementations
//!
//! Each subcommand merges its flags over the optional session file, then
//! hands the resolved settings to `jflasher-core`.

mod info;
mod list;
mod parse;
mod run;

pub use info::show_info;
pub use list::{list_drivers, list_probes};
pub use parse::parse_script;
pub use run::{run_script, RunOptions};

use crate::cli::{ConnectArgs, DriverArgs};
use jflasher_core::config::SessionConfig;
use jflasher_core::connection::ConnectOptions;
use std::path::{Path, PathBuf};

/// Which backend to use and which library paths to try
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverSelection {
    /// Backend name; required before a library can be opened
    pub backend: Option<String>,
    /// Primary library path
    pub primary: Option<PathBuf>,
    /// Backup library path
    pub backup: Option<PathBuf>,
}

impl DriverSelection {
    /// Command-line flags take precedence over the session file
    pub fn resolve(args: &DriverArgs, config: &SessionConfig) -> Self {
        Self {
            backend: args.driver.clone().or_else(|| config.driver.backend.clone()),
            primary: args.dll.clone().or_else(|| config.driver.dll_path.clone()),
            backup: args
                .backup_dll
                .clone()
                .or_else(|| config.driver.backup_dll_path.clone()),
        }
    }

    pub fn primary(&self) -> Option<&Path> {
        self.primary.as_deref()
    }

    pub fn backup(&self) -> Option<&Path> {
        self.backup.as_deref()
    }
}

/// Probe selection and dialog switch from flags and the session file
pub fn connect_options(args: &ConnectArgs, config: &SessionConfig) -> ConnectOptions {
    let from_file = config.connect_options();
    ConnectOptions {
        serial_number: args.serial.or(from_file.serial_number),
        disable_dialogs: !args.allow_dialogs && from_file.disable_dialogs,
    }
}
