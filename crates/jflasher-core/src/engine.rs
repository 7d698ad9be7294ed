//! Engine - one driver session running scripts
//!
//! Ties the pieces together: owns the [`DriverHandle`], extracts connection
//! parameters, connects, and dispatches the remaining commands while
//! publishing every step on the status channel.

use crate::connection::{self, ConnectOptions, ConnectionParameters};
use crate::dispatch::{extract_parameters, Dispatch, Disposition};
use crate::driver::DriverLibrary;
use crate::error::LoadError;
use crate::handle::DriverHandle;
use crate::loader;
use crate::report::{ProgressSink, Reporter, StatusSink};
use crate::script::{Command, Script};
use std::path::Path;
use std::sync::Arc;

/// A scripted flashing session over one driver
pub struct Engine {
    handle: DriverHandle,
    reporter: Reporter,
    progress: Option<Arc<dyn ProgressSink>>,
    options: ConnectOptions,
}

impl Engine {
    /// Create an engine over an already loaded driver
    pub fn new(handle: DriverHandle) -> Self {
        Self {
            handle,
            reporter: Reporter::default(),
            progress: None,
            options: ConnectOptions::default(),
        }
    }

    /// Load a driver through the fallback chain and create an engine
    pub fn open(
        library: &dyn DriverLibrary,
        primary: Option<&Path>,
        backup: Option<&Path>,
    ) -> Result<Self, LoadError> {
        loader::load(library, primary, backup).map(Self::new)
    }

    /// Publish step results to `sink`
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.reporter.set_status_sink(sink);
        self
    }

    /// Publish `loadbin` progress to `sink`
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Set probe selection and dialog options
    pub fn with_connect_options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// The owned driver handle
    pub fn handle(&self) -> &DriverHandle {
        &self.handle
    }

    /// Mutable access to the owned driver handle
    pub fn handle_mut(&mut self) -> &mut DriverHandle {
        &mut self.handle
    }

    /// Open the probe and connect to the target
    pub fn connect(&mut self, params: &ConnectionParameters) -> bool {
        log::info!(
            "Connecting: interface={} speed={} kHz chip={:?}",
            params.interface,
            params.speed,
            params.chip_name
        );
        connection::connect(
            self.handle.driver_mut(),
            params,
            &self.options,
            &self.reporter,
        )
    }

    /// Connect using the script's parameters and run its commands
    ///
    /// Returns `false` if there are no commands, a connection parameter is
    /// invalid, the connect fails, or any command other than an unsupported
    /// one fails.
    pub fn run(
        &mut self,
        commands: &[Command],
        device_description_path: Option<&Path>,
        base_path: Option<&Path>,
    ) -> bool {
        if commands.is_empty() {
            self.reporter.fail("no commands to run");
            return false;
        }

        let params = match extract_parameters(commands, device_description_path) {
            Ok(p) => p,
            Err(e) => {
                self.reporter.fail(e.to_string());
                return false;
            }
        };

        if !self.connect(&params) {
            log::error!("Connect failed, skipping {} command(s)", commands.len());
            return false;
        }

        let mut dispatch = Dispatch {
            driver: self.handle.driver_mut(),
            reporter: &self.reporter,
            progress: self.progress.clone(),
            base_path,
        };

        for cmd in commands {
            log::debug!("> {}", cmd);
            let disposition = dispatch.execute(cmd);
            if disposition.aborts() {
                log::error!("Aborting script at '{}'", cmd);
                return false;
            }
            if let Disposition::Unsupported(_) = disposition {
                log::warn!("Skipping '{}'", cmd);
            }
        }

        true
    }

    /// Parse a script file and [`run`](Self::run) it
    pub fn run_script(
        &mut self,
        path: &Path,
        device_description_path: Option<&Path>,
        base_path: Option<&Path>,
    ) -> bool {
        match Script::from_file(path) {
            Ok(script) => self.run(script.commands(), device_description_path, base_path),
            Err(e) => {
                self.reporter.fail(e.to_string());
                false
            }
        }
    }

    /// Close the driver session now
    pub fn close(mut self) {
        self.handle.close();
    }
}
