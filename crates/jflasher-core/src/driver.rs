//! Probe driver boundary
//!
//! The vendor SDK that speaks to the probe is not part of this crate. These
//! traits describe exactly the calls the engine makes into it, so that a
//! native backend and the in-memory emulator in `jflasher-dummy` are
//! interchangeable.

use crate::error::DriverError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Result type for driver calls
pub type Result<T> = std::result::Result<T, DriverError>;

/// Target interface selected on the probe
///
/// Discriminants match the J-Link SDK's `JLINKARM_TIF_*` values, which is
/// what the `interface` script command carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interface {
    /// IEEE 1149.1 JTAG
    Jtag = 0,
    /// ARM Serial Wire Debug
    #[default]
    Swd = 1,
    /// Background Debug Mode 3
    Bdm3 = 2,
    /// Renesas FINE
    Fine = 3,
    /// Microchip in-circuit serial programming
    Icsp = 4,
    /// SPI
    Spi = 5,
    /// Silicon Labs C2
    C2 = 6,
}

impl Interface {
    /// All interfaces in discriminant order
    pub const ALL: [Interface; 7] = [
        Interface::Jtag,
        Interface::Swd,
        Interface::Bdm3,
        Interface::Fine,
        Interface::Icsp,
        Interface::Spi,
        Interface::C2,
    ];

    /// Numeric value as understood by the driver
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up an interface by its numeric value
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|i| i.code() == code)
    }

    /// Canonical upper-case name
    pub fn name(self) -> &'static str {
        match self {
            Interface::Jtag => "JTAG",
            Interface::Swd => "SWD",
            Interface::Bdm3 => "BDM3",
            Interface::Fine => "FINE",
            Interface::Icsp => "ICSP",
            Interface::Spi => "SPI",
            Interface::C2 => "C2",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interface {
    type Err = String;

    /// Accepts the numeric driver value (`1`) or the name (`SWD`, `swd`)
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u32>() {
            return Interface::from_code(code).ok_or_else(|| format!("unknown interface code {}", code));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown interface '{}'", s))
    }
}

/// A probe reported by driver enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    /// Probe serial number
    pub serial_number: u32,
    /// Product name (e.g. "J-Link PLUS")
    pub product: String,
    /// Optional user-assigned nickname
    pub nickname: Option<String>,
}

impl ProbeInfo {
    /// Create probe info without a nickname
    pub fn new(serial_number: u32, product: impl Into<String>) -> Self {
        Self {
            serial_number,
            product: product.into(),
            nickname: None,
        }
    }
}

impl fmt::Display for ProbeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (S/N {})", self.product, self.serial_number)?;
        if let Some(nick) = &self.nickname {
            write!(f, " \"{}\"", nick)?;
        }
        Ok(())
    }
}

/// Progress of a long-running flash write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Phase reported by the driver (e.g. "Erase", "Program", "Verify")
    pub action: String,
    /// Free-form detail for the phase
    pub detail: String,
    /// Completion of the phase, 0..=100
    pub percent: u8,
}

impl ProgressEvent {
    /// Create an event, clamping `percent` to 100
    pub fn new(action: impl Into<String>, detail: impl Into<String>, percent: u8) -> Self {
        Self {
            action: action.into(),
            detail: detail.into(),
            percent: percent.min(100),
        }
    }

    /// Render as a single console line, e.g. `Program: [#####-----]  50% 0x1000`
    pub fn render(&self) -> String {
        const WIDTH: usize = 20;
        let filled = usize::from(self.percent) * WIDTH / 100;
        format!(
            "{}: [{}{}] {:3}% {}",
            self.action,
            "#".repeat(filled),
            "-".repeat(WIDTH - filled),
            self.percent,
            self.detail
        )
        .trim_end()
        .to_string()
    }
}

/// Callback handed to [`ProbeDriver::flash_write`]
///
/// The driver may call it from any thread; it must only forward data.
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(ProgressEvent) + Send);

/// An open driver instance
///
/// Mirrors the J-Link SDK session calls the engine needs. All calls are
/// blocking. Methods returning `bool` or `i32` pass through the SDK's own
/// success code (`true`, or a non-negative value), which the reporter turns
/// into a step outcome.
pub trait ProbeDriver: Send {
    /// Driver (DLL) version string
    fn version(&self) -> String;

    /// Path of the loaded library, if it came from a file
    fn library_path(&self) -> Option<PathBuf>;

    /// Whether a probe session is currently open
    fn is_open(&self) -> bool;

    /// Number of probes attached to the host
    fn probe_count(&mut self) -> Result<usize>;

    /// Describe every attached probe
    fn enumerate_probes(&mut self) -> Result<Vec<ProbeInfo>>;

    /// Suppress interactive dialogs the driver would otherwise raise
    fn disable_dialogs(&mut self) -> Result<()>;

    /// Open a session on the probe with this serial number
    fn open(&mut self, serial_number: u32) -> Result<()>;

    /// Probe firmware version string (requires an open session)
    fn firmware_version(&mut self) -> Result<String>;

    /// Probe hardware version string (requires an open session)
    fn hardware_version(&mut self) -> Result<String>;

    /// Select the target interface
    fn set_interface(&mut self, interface: Interface) -> Result<bool>;

    /// Point the driver at a device description (XML) file
    fn set_device_description_path(&mut self, path: &Path) -> Result<i32>;

    /// Chip-level connect at the given speed in kHz
    fn connect(&mut self, chip_name: &str, speed_khz: u32) -> Result<()>;

    /// Name of the connected core
    fn core_name(&mut self) -> Result<String>;

    /// Reset the target
    fn reset(&mut self) -> Result<i32>;

    /// Halt the CPU
    fn halt(&mut self) -> Result<bool>;

    /// Mass-erase the target flash, returning the number of bytes erased
    fn erase(&mut self) -> Result<i32>;

    /// Program a binary file at `address`, returning the number of bytes written
    fn flash_write(&mut self, path: &Path, address: u32, on_progress: ProgressCallback<'_>)
        -> Result<i32>;

    /// Let the CPU run again
    fn restart(&mut self) -> Result<bool>;

    /// Close the probe session
    fn close(&mut self);
}

/// A source of [`ProbeDriver`] instances
///
/// Separates "which library file" from "what the driver does", so the loader
/// can walk its fallback chain without knowing the backend.
pub trait DriverLibrary {
    /// Load the driver library at an explicit path
    fn load(&self, path: &Path) -> Result<Box<dyn ProbeDriver>>;

    /// Load whatever driver is installed or discoverable on this host
    fn load_installed(&self) -> Result<Box<dyn ProbeDriver>>;
}
