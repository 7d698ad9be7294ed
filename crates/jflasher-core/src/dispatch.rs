//! Command dispatch
//!
//! Connection parameters (`interface`, `speed`, `device`) are pulled out of
//! the whole script before anything runs, wherever they appear. The remaining
//! commands then execute in script order against the connected target.

use crate::connection::{ConnectionParameters, DEFAULT_SPEED_KHZ};
use crate::driver::{Interface, ProbeDriver, ProgressEvent};
use crate::report::{ProgressSink, Reporter, StepResult};
use crate::script::{Command, CommandName};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// A connection-parameter command that cannot be applied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    /// Command has no parameter
    #[error("{0}: missing parameter")]
    Missing(&'static str),

    /// `interface` value is not a known interface
    #[error("interface: {0}")]
    InvalidInterface(String),

    /// `speed` value is not an integer
    #[error("speed: invalid value '{0}'")]
    InvalidSpeed(String),
}

/// Build connection parameters from the first `interface`, `speed` and
/// `device` commands in the script
pub fn extract_parameters(
    commands: &[Command],
    device_description_path: Option<&Path>,
) -> Result<ConnectionParameters, ParameterError> {
    let mut interface = None;
    let mut speed = None;
    let mut chip_name = None;

    for cmd in commands {
        match cmd.name() {
            CommandName::Interface if interface.is_none() => {
                let value = cmd.first_value().ok_or(ParameterError::Missing("interface"))?;
                interface = Some(
                    value
                        .parse::<Interface>()
                        .map_err(ParameterError::InvalidInterface)?,
                );
            }
            CommandName::Speed if speed.is_none() => {
                let value = cmd.first_value().ok_or(ParameterError::Missing("speed"))?;
                speed = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| ParameterError::InvalidSpeed(value.to_string()))?,
                );
            }
            CommandName::Device if chip_name.is_none() => {
                let value = cmd.first_value().ok_or(ParameterError::Missing("device"))?;
                chip_name = Some(value.to_string());
            }
            _ => {}
        }
    }

    Ok(ConnectionParameters {
        interface: interface.unwrap_or_default(),
        speed: speed.unwrap_or(DEFAULT_SPEED_KHZ),
        chip_name: chip_name.unwrap_or_default(),
        device_description_path: device_description_path.map(Path::to_path_buf),
    })
}

/// What the dispatcher does after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Connection parameter, already applied
    Consumed,
    /// Command ran and succeeded
    Completed(StepResult),
    /// Command is not supported; carry on with the next one
    Unsupported(StepResult),
    /// Command failed; stop the script
    Failed(StepResult),
}

impl Disposition {
    fn from_step(result: StepResult) -> Self {
        if result.ok {
            Disposition::Completed(result)
        } else {
            Disposition::Failed(result)
        }
    }

    /// Whether dispatch should stop here
    pub fn aborts(&self) -> bool {
        matches!(self, Disposition::Failed(_))
    }
}

/// State shared by every command of one run
pub struct Dispatch<'a> {
    /// Connected driver
    pub driver: &'a mut dyn ProbeDriver,
    /// Status reporting
    pub reporter: &'a Reporter,
    /// Destination for `loadbin` progress
    pub progress: Option<Arc<dyn ProgressSink>>,
    /// Directory `loadbin` paths are relative to
    pub base_path: Option<&'a Path>,
}

impl Dispatch<'_> {
    /// Execute one command against the connected target
    pub fn execute(&mut self, cmd: &Command) -> Disposition {
        let driver = &mut *self.driver;
        match cmd.name() {
            CommandName::Interface | CommandName::Speed | CommandName::Device => {
                Disposition::Consumed
            }
            CommandName::Reset => Disposition::from_step(self.reporter.call("reset", || driver.reset())),
            CommandName::Halt => Disposition::from_step(self.reporter.call("halt", || driver.halt())),
            CommandName::Erase => Disposition::from_step(self.reporter.call("erase", || driver.erase())),
            CommandName::Go => {
                Disposition::from_step(self.reporter.call("restart", || driver.restart()))
            }
            CommandName::Exit => Disposition::Completed(self.reporter.succeed("exit")),
            CommandName::LoadBin => self.load_binaries(cmd),
            CommandName::Unknown(name) => {
                Disposition::Unsupported(self.reporter.fail(format!("unsupported command: {}", name)))
            }
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match self.base_path {
            Some(base) => base.join(path),
            None => PathBuf::from(path),
        }
    }

    fn load_binaries(&mut self, cmd: &Command) -> Disposition {
        let mut images = cmd.images().peekable();
        if images.peek().is_none() {
            return Disposition::Failed(self.reporter.fail("loadbin: no file,address parameter"));
        }

        let mut last = None;
        for image in images {
            let address = match image.parse_address() {
                Ok(a) => a,
                Err(e) => {
                    return Disposition::Failed(
                        self.reporter
                            .fail(format!("loadbin: invalid address '{}': {}", image.address, e)),
                    )
                }
            };
            let path = self.resolve(&image.path);

            let sink = self.progress.clone();
            let mut on_progress = move |event: ProgressEvent| {
                log::debug!("{}", event.render());
                if let Some(sink) = &sink {
                    sink.progress(event.percent, &event.action, &event.detail);
                }
            };

            let driver = &mut *self.driver;
            let result = self.reporter.call(
                &format!("flash_write({}, 0x{:08X})", path.display(), address),
                || driver.flash_write(&path, address, &mut on_progress),
            );
            if !result.ok {
                return Disposition::Failed(result);
            }
            last = Some(result);
        }

        last.map_or(Disposition::Consumed, Disposition::Completed)
    }
}
