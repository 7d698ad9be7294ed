//! DriverHandle - owned driver with guaranteed single close

use crate::driver::ProbeDriver;
use std::fmt;
use std::path::PathBuf;

/// Where a loaded driver came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSource {
    /// The explicitly requested library
    Primary(PathBuf),
    /// The driver installed on the host
    Installed,
    /// The last-resort bundled library
    Backup(PathBuf),
}

impl fmt::Display for DriverSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverSource::Primary(p) => write!(f, "primary library {}", p.display()),
            DriverSource::Installed => write!(f, "installed driver"),
            DriverSource::Backup(p) => write!(f, "backup library {}", p.display()),
        }
    }
}

/// Owns a loaded driver and its probe session
///
/// The session is closed exactly once: either by an explicit [`close`]
/// or when the handle is dropped.
///
/// [`close`]: DriverHandle::close
pub struct DriverHandle {
    driver: Box<dyn ProbeDriver>,
    source: DriverSource,
    closed: bool,
}

impl DriverHandle {
    /// Wrap a loaded driver
    pub fn new(driver: Box<dyn ProbeDriver>, source: DriverSource) -> Self {
        Self {
            driver,
            source,
            closed: false,
        }
    }

    /// Where the driver was loaded from
    pub fn source(&self) -> &DriverSource {
        &self.source
    }

    /// Shared access to the driver
    pub fn driver(&self) -> &dyn ProbeDriver {
        self.driver.as_ref()
    }

    /// Mutable access to the driver
    pub fn driver_mut(&mut self) -> &mut dyn ProbeDriver {
        self.driver.as_mut()
    }

    /// Whether [`close`](Self::close) already ran
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the probe session; later calls do nothing
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        log::debug!("Closing driver ({})", self.source);
        self.driver.close();
        self.closed = true;
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverHandle")
            .field("source", &self.source)
            .field("version", &self.driver.version())
            .field("closed", &self.closed)
            .finish()
    }
}
