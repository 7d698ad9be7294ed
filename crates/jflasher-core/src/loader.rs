//! Driver loading with fallback
//!
//! Field setups often ship a bundled J-Link library whose version differs
//! from the one installed system-wide. The loader tries, in order:
//!
//! 1. the primary library path, if given and not blank
//! 2. the driver installed on the host
//! 3. the backup library path, if given and not blank
//!
//! and stops at the first source that yields a driver.

use crate::driver::{DriverLibrary, ProbeDriver};
use crate::error::{DriverError, LoadError};
use crate::handle::{DriverHandle, DriverSource};
use crate::platform::Platform;
use crate::report::catch_fault;
use std::fmt;
use std::path::{Path, PathBuf};

/// One place to look for a driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Explicit library path
    Primary(PathBuf),
    /// Host-installed driver
    Installed,
    /// Last-resort library path
    Backup(PathBuf),
}

impl LoadStrategy {
    fn source(&self) -> DriverSource {
        match self {
            LoadStrategy::Primary(p) => DriverSource::Primary(p.clone()),
            LoadStrategy::Installed => DriverSource::Installed,
            LoadStrategy::Backup(p) => DriverSource::Backup(p.clone()),
        }
    }

    fn attempt(&self, library: &dyn DriverLibrary) -> Result<Box<dyn ProbeDriver>, DriverError> {
        match self {
            LoadStrategy::Primary(p) | LoadStrategy::Backup(p) => catch_fault(|| library.load(p)),
            LoadStrategy::Installed => catch_fault(|| library.load_installed()),
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source())
    }
}

/// Progress of a [`DriverLoader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// No source tried yet
    Untried,
    /// Currently trying the strategy at this index
    Trying(usize),
    /// A driver was loaded from this source
    Loaded(DriverSource),
    /// Every source failed
    ExhaustedFailed,
}

/// Walks the fallback chain once
pub struct DriverLoader<'a> {
    library: &'a dyn DriverLibrary,
    strategies: Vec<LoadStrategy>,
    state: LoadState,
}

/// Log version and library path; a driver faulting here is not fatal
fn log_driver_identity(driver: &dyn ProbeDriver) {
    match catch_fault(|| Ok(driver.version())) {
        Ok(version) => log::info!("Driver version: {}", version),
        Err(e) => log::warn!("Driver version: <unknown> ({})", e),
    }
    match catch_fault(|| Ok(driver.library_path())) {
        Ok(Some(path)) => log::info!("Driver library: {}", path.display()),
        Ok(None) => log::info!("Driver library: <unknown>"),
        Err(e) => log::warn!("Driver library: <unknown> ({})", e),
    }
}

/// Treat unset and whitespace-only paths the same
fn non_blank(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
}

impl<'a> DriverLoader<'a> {
    /// Build the strategy list from optional primary and backup paths
    pub fn new(library: &'a dyn DriverLibrary, primary: Option<&Path>, backup: Option<&Path>) -> Self {
        let mut strategies = Vec::with_capacity(3);

        match non_blank(primary) {
            Some(p) => strategies.push(LoadStrategy::Primary(p.to_path_buf())),
            None => log::warn!("Primary driver path is empty"),
        }
        strategies.push(LoadStrategy::Installed);
        match non_blank(backup) {
            Some(p) => strategies.push(LoadStrategy::Backup(p.to_path_buf())),
            None => log::debug!("Backup driver path is empty"),
        }

        Self {
            library,
            strategies,
            state: LoadState::Untried,
        }
    }

    /// Strategies in the order they will be tried
    pub fn strategies(&self) -> &[LoadStrategy] {
        &self.strategies
    }

    /// Current state
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Try each strategy until one yields a driver
    pub fn load(&mut self) -> Result<DriverHandle, LoadError> {
        let mut failures = Vec::new();

        for (index, strategy) in self.strategies.iter().enumerate() {
            self.state = LoadState::Trying(index);
            log::debug!("Trying {}", strategy);

            match strategy.attempt(self.library) {
                Ok(driver) => {
                    let source = strategy.source();
                    log_driver_identity(driver.as_ref());
                    self.state = LoadState::Loaded(source.clone());
                    return Ok(DriverHandle::new(driver, source));
                }
                Err(e) => {
                    log::warn!("Cannot load {}: {}", strategy, e);
                    if *strategy == LoadStrategy::Installed {
                        log::debug!(
                            "No installed {} found on {}",
                            Platform::current().driver_library_name(),
                            Platform::current()
                        );
                    }
                    failures.push((strategy.to_string(), e));
                }
            }
        }

        log::error!("Failed to load a J-Link driver");
        self.state = LoadState::ExhaustedFailed;
        Err(LoadError { failures })
    }
}

/// Load a driver, trying primary, installed, then backup
pub fn load(
    library: &dyn DriverLibrary,
    primary: Option<&Path>,
    backup: Option<&Path>,
) -> Result<DriverHandle, LoadError> {
    DriverLoader::new(library, primary, backup).load()
}
