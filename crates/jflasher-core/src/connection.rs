//! Probe session opening and chip-level connect

use crate::driver::{Interface, ProbeDriver};
use crate::report::{Reporter, StepResult};
use std::path::{Path, PathBuf};

/// Default interface speed in kHz
pub const DEFAULT_SPEED_KHZ: u32 = 10_000;

/// What to connect to and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    /// Target interface
    pub interface: Interface,
    /// Interface speed in kHz
    pub speed: u32,
    /// Target chip name as known by the driver
    pub chip_name: String,
    /// Device description XML to load before connecting
    pub device_description_path: Option<PathBuf>,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            interface: Interface::Swd,
            speed: DEFAULT_SPEED_KHZ,
            chip_name: String::new(),
            device_description_path: None,
        }
    }
}

/// Session options that do not come from the script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Open this probe instead of the first one enumerated
    pub serial_number: Option<u32>,
    /// Suppress driver dialogs before opening
    pub disable_dialogs: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            serial_number: None,
            disable_dialogs: true,
        }
    }
}

fn check(result: StepResult) -> Result<(), StepResult> {
    if result.ok {
        Ok(())
    } else {
        Err(result)
    }
}

fn log_probe_versions(driver: &mut dyn ProbeDriver) {
    match driver.firmware_version() {
        Ok(v) => log::info!("Probe firmware: {}", v),
        Err(e) => log::warn!("Cannot read probe firmware version: {}", e),
    }
    match driver.hardware_version() {
        Ok(v) => log::info!("Probe hardware: {}", v),
        Err(e) => log::warn!("Cannot read probe hardware version: {}", e),
    }
}

fn open_probe(
    driver: &mut dyn ProbeDriver,
    options: &ConnectOptions,
    reporter: &Reporter,
) -> Result<(), StepResult> {
    if let Some(serial) = options.serial_number {
        return check(reporter.call(&format!("open({})", serial), || driver.open(serial)));
    }

    let (step, probes) = reporter.call_value("enumerate_probes", || driver.enumerate_probes());
    check(step)?;
    let probes = probes.unwrap_or_default();
    for (i, probe) in probes.iter().enumerate() {
        log::info!("Probe[{}]: {}", i, probe);
    }

    // Only the first enumerated probe is used
    let Some(first) = probes.first() else {
        return Err(reporter.fail("no probe found"));
    };
    let serial = first.serial_number;
    check(reporter.call(&format!("open({})", serial), || driver.open(serial)))
}

fn non_blank(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
}

/// Run the connect sequence, stopping at the first failing step
///
/// On failure the failing step's result is returned; it has already been
/// reported.
pub fn connect_steps(
    driver: &mut dyn ProbeDriver,
    params: &ConnectionParameters,
    options: &ConnectOptions,
    reporter: &Reporter,
) -> Result<(), StepResult> {
    let (step, count) = reporter.call_value("probe_count", || driver.probe_count());
    check(step)?;
    if count.unwrap_or(0) == 0 {
        return Err(reporter.fail("no probe connected"));
    }

    if options.disable_dialogs {
        check(reporter.call("disable_dialogs", || driver.disable_dialogs()))?;
    }

    open_probe(driver, options, reporter)?;
    log_probe_versions(driver);

    let interface = params.interface;
    check(reporter.call(&format!("set_interface({})", interface), || {
        driver.set_interface(interface)
    }))?;

    if let Some(xml) = non_blank(params.device_description_path.as_deref()) {
        check(reporter.call(
            &format!("set_device_description_path({})", xml.display()),
            || driver.set_device_description_path(xml),
        ))?;
    }

    let chip = params.chip_name.as_str();
    let speed = params.speed;
    check(reporter.call(&format!("connect({}, {} kHz)", chip, speed), || {
        driver.connect(chip, speed)
    }))?;

    match driver.core_name() {
        Ok(name) => log::info!("Core: {}", name),
        Err(e) => log::warn!("Cannot read core name: {}", e),
    }
    Ok(())
}

/// Open a probe session and connect to the target chip
pub fn connect(
    driver: &mut dyn ProbeDriver,
    params: &ConnectionParameters,
    options: &ConnectOptions,
    reporter: &Reporter,
) -> bool {
    connect_steps(driver, params, options, reporter).is_ok()
}
