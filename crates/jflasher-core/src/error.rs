//! Error types for jflasher-core

use std::path::PathBuf;
use thiserror::Error;

/// Faults raised across the probe driver boundary
///
/// Driver implementations return these from every fallible call. They are
/// converted into a failed [`StepResult`](crate::report::StepResult) by the
/// reporter and never escape the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Library file does not exist
    #[error("library not found: {0}")]
    LibraryNotFound(PathBuf),

    /// Library exists but could not be loaded
    #[error("failed to load {path}: {reason}")]
    LoadFailed {
        /// Path that was attempted
        path: PathBuf,
        /// Reason reported by the loader
        reason: String,
    },

    /// No installed driver could be discovered on this host
    #[error("no installed J-Link driver found")]
    NotInstalled,

    /// A session call was made before a probe was opened
    #[error("probe is not open")]
    NotOpen,

    /// No probe with the requested serial number is attached
    #[error("no probe with serial number {0}")]
    ProbeNotFound(u32),

    /// A target call was made before the chip-level connect succeeded
    #[error("target is not connected")]
    NotConnected,

    /// The driver does not know the requested device name
    #[error("unsupported device: {0}")]
    UnsupportedDevice(String),

    /// Address range is outside the target's flash
    #[error("address range 0x{start:08X}..0x{end:08X} is outside flash")]
    AddressOutOfRange {
        /// First byte of the rejected range
        start: u64,
        /// One past the last byte of the rejected range
        end: u64,
    },

    /// I/O error while the driver accessed a file
    #[error("I/O error: {0}")]
    Io(String),

    /// The driver call reported an error code
    #[error("{call} failed with code {code}")]
    ErrorCode {
        /// Name of the driver call
        call: &'static str,
        /// Error code returned by the driver
        code: i32,
    },

    /// The driver panicked inside the call
    #[error("driver panicked: {0}")]
    Panicked(String),
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        DriverError::Io(e.to_string())
    }
}

/// Reasons a script file is refused before any line is read
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Path does not exist
    #[error("script not found: {0}")]
    NotFound(PathBuf),

    /// Path exists but is not a regular file
    #[error("script is not a regular file: {0}")]
    NotAFile(PathBuf),

    /// File name does not end in the script extension
    #[error("script must have a .{extension} extension: {path}")]
    BadExtension {
        /// Path that was refused
        path: PathBuf,
        /// Required extension
        extension: &'static str,
    },

    /// Reading the file failed
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),
}

/// A `loadbin` address that cannot be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Empty, signed, or containing a non-hex digit
    #[error("not a hexadecimal number")]
    NotHex,

    /// Larger than the 32-bit address space
    #[error("does not fit in 32 bits")]
    Overflow,
}

/// Every driver source was tried and none produced a driver
#[derive(Error, Debug)]
#[error("no usable J-Link driver ({} source(s) tried)", .failures.len())]
pub struct LoadError {
    /// Each attempted source with the reason it failed, in attempt order
    pub failures: Vec<(String, DriverError)>,
}
