//! Session configuration file
//!
//! Optional TOML file holding the settings that usually stay fixed for a
//! given bench setup:
//!
//! ```toml
//! [driver]
//! backend = "dummy"
//! dll_path = "asset/jlink/7.60b/JLink_x64.dll"
//! backup_dll_path = "asset/jlink/6.94d/JLink_x64.dll"
//!
//! [connect]
//! serial = 260101234
//! device_xml = "asset/devices/JLinkDevices.xml"
//! disable_dialogs = true
//!
//! [script]
//! base_path = "build/images"
//! ```

use crate::connection::ConnectOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading a session file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid session TOML
    #[error("invalid session config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// `[driver]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Backend name (see `jflasher list-drivers`)
    pub backend: Option<String>,
    /// Primary library path
    pub dll_path: Option<PathBuf>,
    /// Backup library path
    pub backup_dll_path: Option<PathBuf>,
}

/// `[connect]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectConfig {
    /// Probe serial number
    pub serial: Option<u32>,
    /// Device description XML
    pub device_xml: Option<PathBuf>,
    /// Suppress driver dialogs (default: true)
    pub disable_dialogs: Option<bool>,
}

/// `[script]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptConfig {
    /// Directory `loadbin` paths are relative to
    pub base_path: Option<PathBuf>,
}

/// Whole session file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Driver selection
    pub driver: DriverConfig,
    /// Probe connection
    pub connect: ConnectConfig,
    /// Script execution
    pub script: ScriptConfig,
}

impl SessionConfig {
    /// Load a session file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse session TOML
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Connect options described by the `[connect]` table
    pub fn connect_options(&self) -> ConnectOptions {
        let defaults = ConnectOptions::default();
        ConnectOptions {
            serial_number: self.connect.serial,
            disable_dialogs: self
                .connect
                .disable_dialogs
                .unwrap_or(defaults.disable_dialogs),
        }
    }
}
