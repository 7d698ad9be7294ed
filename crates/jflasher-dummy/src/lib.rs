//! jflasher-dummy - Emulated J-Link driver for testing
//!
//! This crate provides a driver library that emulates attached probes and a
//! target with flash in memory. It's useful for testing and development
//! without real hardware. Every session call is recorded, and faults can be
//! injected per call to exercise the engine's failure paths.

use jflasher_core::driver::{
    DriverLibrary, Interface, ProbeDriver, ProbeInfo, ProgressCallback, ProgressEvent, Result,
};
use jflasher_core::platform::Platform;
use jflasher_core::DriverError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Erase granularity of the emulated flash
const SECTOR_SIZE: usize = 4096;
/// Bytes programmed per progress update
const PROGRAM_CHUNK: usize = 4096;

/// Fault to inject into a driver call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Return an error from the call
    Error,
    /// Return a failing code (`false` or `-1`); calls without a code error instead
    Reject,
    /// Panic inside the call
    Panic,
}

/// Configuration for the emulated driver
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Probes reported as attached
    pub probes: Vec<ProbeInfo>,
    /// What enumeration returns, when it disagrees with `probes`
    pub enumerated: Option<Vec<ProbeInfo>>,
    /// Driver library version
    pub version: String,
    /// Probe firmware version
    pub firmware_version: String,
    /// Probe hardware version
    pub hardware_version: String,
    /// Core name reported after connect
    pub core_name: String,
    /// Address of the first flash byte
    pub flash_base: u32,
    /// Flash size in bytes
    pub flash_size: usize,
    /// Device names accepted by `connect`; empty accepts any
    pub devices: Vec<String>,
    /// Faults keyed by driver call name
    pub faults: HashMap<&'static str, Fault>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            probes: vec![ProbeInfo::new(260101234, "J-Link PLUS")],
            enumerated: None,
            version: "V7.94e".to_string(),
            firmware_version: "J-Link V11 compiled Dec  1 2023".to_string(),
            hardware_version: "11.00".to_string(),
            core_name: "Cortex-M4".to_string(),
            flash_base: 0,
            flash_size: 1024 * 1024,
            devices: Vec::new(),
            faults: HashMap::new(),
        }
    }
}

impl DummyConfig {
    /// Replace the attached probes
    pub fn with_probes(mut self, probes: Vec<ProbeInfo>) -> Self {
        self.probes = probes;
        self
    }

    /// Make enumeration report `probes` regardless of the attached ones
    pub fn with_enumerated(mut self, probes: Vec<ProbeInfo>) -> Self {
        self.enumerated = Some(probes);
        self
    }

    /// Place the emulated flash
    pub fn with_flash(mut self, base: u32, size: usize) -> Self {
        self.flash_base = base;
        self.flash_size = size;
        self
    }

    /// Restrict `connect` to these device names
    pub fn with_devices(mut self, devices: &[&str]) -> Self {
        self.devices = devices.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Inject a fault into the named call
    pub fn fail(mut self, call: &'static str, fault: Fault) -> Self {
        self.faults.insert(call, fault);
        self
    }
}

#[derive(Debug, Default)]
struct Shared {
    calls: Vec<String>,
    memory: Vec<u8>,
    closes: usize,
}

/// Observes an emulated driver after it was handed to the engine
#[derive(Debug, Clone, Default)]
pub struct DummyMonitor(Arc<Mutex<Shared>>);

impl DummyMonitor {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: impl Into<String>) {
        self.lock().calls.push(call.into());
    }

    /// Every recorded call, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Whether a call starting with `prefix` was recorded
    pub fn called(&self, prefix: &str) -> bool {
        self.lock().calls.iter().any(|c| c.starts_with(prefix))
    }

    /// Snapshot of the emulated flash
    pub fn memory(&self) -> Vec<u8> {
        self.lock().memory.clone()
    }

    /// Number of times a session was closed
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }
}

/// Emulated driver library
///
/// Paths registered with [`with_loadable`](Self::with_loadable) load; others
/// fail as a missing or foreign library would.
pub struct DummyLibrary {
    config: DummyConfig,
    loadable: Vec<PathBuf>,
    installed: bool,
    monitor: DummyMonitor,
}

impl DummyLibrary {
    /// Create a library with nothing installed and no loadable paths
    pub fn new(config: DummyConfig) -> Self {
        let monitor = DummyMonitor::default();
        monitor.lock().memory = vec![0xFF; config.flash_size];
        Self {
            config,
            loadable: Vec::new(),
            installed: false,
            monitor,
        }
    }

    /// Let `path` load successfully
    pub fn with_loadable(mut self, path: impl Into<PathBuf>) -> Self {
        self.loadable.push(path.into());
        self
    }

    /// Report a driver as installed on the host
    pub fn with_installed(mut self, installed: bool) -> Self {
        self.installed = installed;
        self
    }

    /// Monitor shared by every driver this library creates
    pub fn monitor(&self) -> DummyMonitor {
        self.monitor.clone()
    }

    fn create(&self, library_path: PathBuf) -> Box<dyn ProbeDriver> {
        Box::new(DummyProbe {
            config: self.config.clone(),
            library_path,
            monitor: self.monitor.clone(),
            opened: None,
            connected: false,
            interface: Interface::default(),
            halted: false,
        })
    }
}

impl DriverLibrary for DummyLibrary {
    fn load(&self, path: &Path) -> Result<Box<dyn ProbeDriver>> {
        self.monitor.record(format!("load({})", path.display()));

        if self.loadable.iter().any(|p| p == path) {
            return Ok(self.create(path.to_path_buf()));
        }
        if !path.exists() {
            return Err(DriverError::LibraryNotFound(path.to_path_buf()));
        }
        Err(DriverError::LoadFailed {
            path: path.to_path_buf(),
            reason: "not a J-Link library".to_string(),
        })
    }

    fn load_installed(&self) -> Result<Box<dyn ProbeDriver>> {
        self.monitor.record("load_installed");
        if !self.installed {
            return Err(DriverError::NotInstalled);
        }

        let platform = Platform::current();
        let dir = platform
            .default_library_dirs()
            .into_iter()
            .next()
            .unwrap_or_default();
        Ok(self.create(dir.join(platform.driver_library_name())))
    }
}

/// Emulated probe session
pub struct DummyProbe {
    config: DummyConfig,
    library_path: PathBuf,
    monitor: DummyMonitor,
    opened: Option<u32>,
    connected: bool,
    interface: Interface,
    halted: bool,
}

impl DummyProbe {
    /// Apply an injected fault; `Ok(true)` asks the call to return a failing code
    fn injected(&self, call: &'static str) -> Result<bool> {
        match self.config.faults.get(call) {
            None => Ok(false),
            Some(Fault::Reject) => Ok(true),
            Some(Fault::Error) => Err(DriverError::ErrorCode { call, code: -1 }),
            Some(Fault::Panic) => panic!("{}: injected fault", call),
        }
    }

    /// Like [`injected`](Self::injected) for calls without a return code
    fn injected_hard(&self, call: &'static str) -> Result<()> {
        if self.injected(call)? {
            return Err(DriverError::ErrorCode { call, code: -1 });
        }
        Ok(())
    }

    fn require_open(&self) -> Result<u32> {
        self.opened.ok_or(DriverError::NotOpen)
    }

    fn require_connected(&self) -> Result<()> {
        self.require_open()?;
        if self.connected {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }

    /// Offset into emulated flash for `[address, address + len)`
    fn flash_offset(&self, address: u32, len: usize) -> Result<usize> {
        let start = u64::from(address);
        let end = start + len as u64;
        let base = u64::from(self.config.flash_base);
        let limit = base + self.config.flash_size as u64;
        if start < base || end > limit {
            return Err(DriverError::AddressOutOfRange { start, end });
        }
        Ok((start - base) as usize)
    }
}

impl ProbeDriver for DummyProbe {
    fn version(&self) -> String {
        if self.config.faults.get("version") == Some(&Fault::Panic) {
            panic!("version: injected fault");
        }
        self.config.version.clone()
    }

    fn library_path(&self) -> Option<PathBuf> {
        Some(self.library_path.clone())
    }

    fn is_open(&self) -> bool {
        self.opened.is_some()
    }

    fn probe_count(&mut self) -> Result<usize> {
        self.monitor.record("probe_count");
        self.injected_hard("probe_count")?;
        Ok(self.config.probes.len())
    }

    fn enumerate_probes(&mut self) -> Result<Vec<ProbeInfo>> {
        self.monitor.record("enumerate_probes");
        self.injected_hard("enumerate_probes")?;
        Ok(self
            .config
            .enumerated
            .clone()
            .unwrap_or_else(|| self.config.probes.clone()))
    }

    fn disable_dialogs(&mut self) -> Result<()> {
        self.monitor.record("disable_dialogs");
        self.injected_hard("disable_dialogs")
    }

    fn open(&mut self, serial_number: u32) -> Result<()> {
        self.monitor.record(format!("open({})", serial_number));
        self.injected_hard("open")?;
        if !self.config.probes.iter().any(|p| p.serial_number == serial_number) {
            return Err(DriverError::ProbeNotFound(serial_number));
        }
        self.opened = Some(serial_number);
        Ok(())
    }

    fn firmware_version(&mut self) -> Result<String> {
        self.require_open()?;
        Ok(self.config.firmware_version.clone())
    }

    fn hardware_version(&mut self) -> Result<String> {
        self.require_open()?;
        Ok(self.config.hardware_version.clone())
    }

    fn set_interface(&mut self, interface: Interface) -> Result<bool> {
        self.monitor.record(format!("set_interface({})", interface));
        if self.injected("set_interface")? {
            return Ok(false);
        }
        self.require_open()?;
        self.interface = interface;
        Ok(true)
    }

    fn set_device_description_path(&mut self, path: &Path) -> Result<i32> {
        self.monitor
            .record(format!("set_device_description_path({})", path.display()));
        if self.injected("set_device_description_path")? {
            return Ok(-1);
        }
        self.require_open()?;
        Ok(0)
    }

    fn connect(&mut self, chip_name: &str, speed_khz: u32) -> Result<()> {
        self.monitor
            .record(format!("connect({}, {})", chip_name, speed_khz));
        self.injected_hard("connect")?;
        self.require_open()?;
        if !self.config.devices.is_empty()
            && !self
                .config
                .devices
                .iter()
                .any(|d| d.eq_ignore_ascii_case(chip_name))
        {
            return Err(DriverError::UnsupportedDevice(chip_name.to_string()));
        }
        log::debug!(
            "dummy: connected to {:?} over {} at {} kHz",
            chip_name,
            self.interface,
            speed_khz
        );
        self.connected = true;
        Ok(())
    }

    fn core_name(&mut self) -> Result<String> {
        self.require_connected()?;
        Ok(self.config.core_name.clone())
    }

    fn reset(&mut self) -> Result<i32> {
        self.monitor.record("reset");
        if self.injected("reset")? {
            return Ok(-1);
        }
        self.require_connected()?;
        self.halted = true;
        Ok(0)
    }

    fn halt(&mut self) -> Result<bool> {
        self.monitor.record("halt");
        if self.injected("halt")? {
            return Ok(false);
        }
        self.require_connected()?;
        if self.halted {
            log::debug!("dummy: CPU already halted");
        }
        self.halted = true;
        Ok(true)
    }

    fn erase(&mut self) -> Result<i32> {
        self.monitor.record("erase");
        if self.injected("erase")? {
            return Ok(-1);
        }
        self.require_connected()?;
        self.monitor.lock().memory.fill(0xFF);
        Ok(i32::try_from(self.config.flash_size).unwrap_or(i32::MAX))
    }

    fn flash_write(
        &mut self,
        path: &Path,
        address: u32,
        on_progress: ProgressCallback<'_>,
    ) -> Result<i32> {
        self.monitor
            .record(format!("flash_write({}, 0x{:08X})", path.display(), address));
        if self.injected("flash_write")? {
            return Ok(-1);
        }
        self.require_connected()?;

        let data = fs::read(path)?;
        let offset = self.flash_offset(address, data.len())?;
        let detail = format!("0x{:08X}", address);

        on_progress(ProgressEvent::new("Compare", detail.as_str(), 100));

        // Erase every sector the image touches
        let first = offset / SECTOR_SIZE * SECTOR_SIZE;
        let last = (offset + data.len()).div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
        let last = last.min(self.config.flash_size);
        let sectors = (last - first) / SECTOR_SIZE;
        for (i, start) in (first..last).step_by(SECTOR_SIZE).enumerate() {
            let end = (start + SECTOR_SIZE).min(last);
            self.monitor.lock().memory[start..end].fill(0xFF);
            let percent = ((i + 1) * 100 / sectors.max(1)) as u8;
            on_progress(ProgressEvent::new("Erase", detail.as_str(), percent));
        }

        let total = data.len().max(1);
        for (i, chunk) in data.chunks(PROGRAM_CHUNK).enumerate() {
            let start = offset + i * PROGRAM_CHUNK;
            self.monitor.lock().memory[start..start + chunk.len()].copy_from_slice(chunk);
            let done = i * PROGRAM_CHUNK + chunk.len();
            on_progress(ProgressEvent::new(
                "Program",
                detail.as_str(),
                (done * 100 / total) as u8,
            ));
        }

        let verified = self.monitor.lock().memory[offset..offset + data.len()] == data[..];
        on_progress(ProgressEvent::new("Verify", detail.as_str(), 100));
        if !verified {
            return Ok(-1);
        }

        Ok(i32::try_from(data.len()).unwrap_or(i32::MAX))
    }

    fn restart(&mut self) -> Result<bool> {
        self.monitor.record("restart");
        if self.injected("restart")? {
            return Ok(false);
        }
        self.require_connected()?;
        log::debug!("dummy: restart (halted: {})", self.halted);
        self.halted = false;
        Ok(true)
    }

    fn close(&mut self) {
        self.monitor.record("close");
        self.monitor.lock().closes += 1;
        self.opened = None;
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jflasher_core::connection::ConnectOptions;
    use jflasher_core::engine::Engine;
    use jflasher_core::handle::DriverSource;
    use jflasher_core::report::{ProgressSink, StatusSink};
    use jflasher_core::script::Script;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const BRINGUP: &str =
        "interface 1\nspeed 4000\ndevice NRF52840\nreset\nhalt\nloadbin app.bin,0x0\ngo\nexit\n";

    /// Status and progress notifications in arrival order
    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<String>>>);

    impl Journal {
        fn status_sink(&self) -> Arc<dyn StatusSink> {
            let journal = self.clone();
            Arc::new(move |ok: bool, msg: &str| {
                let tag = if ok { "ok" } else { "err" };
                journal.0.lock().unwrap().push(format!("{}: {}", tag, msg));
            })
        }

        fn progress_sink(&self) -> Arc<dyn ProgressSink> {
            let journal = self.clone();
            Arc::new(move |percent: u8, action: &str, _detail: &str| {
                journal
                    .0
                    .lock()
                    .unwrap()
                    .push(format!("progress: {} {}", action, percent));
            })
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn last(&self) -> Option<String> {
            self.0.lock().unwrap().last().cloned()
        }
    }

    fn workspace(files: &[(&str, &[u8])]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    fn engine(lib: &DummyLibrary, journal: &Journal) -> Engine {
        Engine::open(lib, None, None)
            .unwrap()
            .with_status_sink(journal.status_sink())
            .with_progress_sink(journal.progress_sink())
    }

    fn installed(config: DummyConfig) -> DummyLibrary {
        DummyLibrary::new(config).with_installed(true)
    }

    #[test]
    fn test_bringup_script_end_to_end() {
        let image: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
        let dir = workspace(&[("app.bin", &image[..]), ("bringup.jlink", BRINGUP.as_bytes())]);
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        assert!(engine.run_script(
            &dir.path().join("bringup.jlink"),
            None,
            Some(dir.path())
        ));

        let app = dir.path().join("app.bin");
        assert_eq!(
            monitor.calls(),
            vec![
                "load_installed".to_string(),
                "probe_count".to_string(),
                "disable_dialogs".to_string(),
                "enumerate_probes".to_string(),
                "open(260101234)".to_string(),
                "set_interface(SWD)".to_string(),
                "connect(NRF52840, 4000)".to_string(),
                "reset".to_string(),
                "halt".to_string(),
                format!("flash_write({}, 0x00000000)", app.display()),
                "restart".to_string(),
            ]
        );

        let memory = monitor.memory();
        assert_eq!(&memory[..image.len()], &image[..]);
        assert_eq!(memory[image.len()], 0xFF);

        drop(engine);
        assert_eq!(monitor.close_count(), 1);
        assert_eq!(monitor.calls().last().map(String::as_str), Some("close"));
    }

    #[test]
    fn test_progress_only_during_loadbin() {
        let image = vec![0xA5u8; 3 * 4096];
        let dir = workspace(&[("app.bin", &image[..]), ("bringup.jlink", BRINGUP.as_bytes())]);
        let lib = installed(DummyConfig::default());
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        assert!(engine.run_script(
            &dir.path().join("bringup.jlink"),
            None,
            Some(dir.path())
        ));

        let entries = journal.entries();
        let halt = entries.iter().position(|e| e == "ok: halt ret: true").unwrap();
        let written = entries
            .iter()
            .position(|e| e.starts_with("ok: flash_write(") && e.ends_with("ret: 12288"))
            .unwrap();
        let progress: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.starts_with("progress: "))
            .map(|(i, _)| i)
            .collect();

        assert!(!progress.is_empty());
        assert!(progress.iter().all(|&i| i > halt && i < written));
        assert_eq!(entries[halt + 1], "progress: Compare 100");
        assert_eq!(entries[written - 1], "progress: Verify 100");
        assert_eq!(
            entries.iter().filter(|e| e.starts_with("progress: Program")).count(),
            3
        );
        assert_eq!(journal.last().as_deref(), Some("ok: exit"));
    }

    #[test]
    fn test_loader_falls_back_to_backup() {
        let dir = workspace(&[("JLink_backup.dll", &b""[..])]);
        let primary = dir.path().join("missing").join("JLink_x64.dll");
        let backup = dir.path().join("JLink_backup.dll");
        let lib = DummyLibrary::new(DummyConfig::default()).with_loadable(&backup);
        let monitor = lib.monitor();

        let engine = Engine::open(&lib, Some(primary.as_path()), Some(backup.as_path())).unwrap();
        assert_eq!(
            monitor.calls(),
            vec![
                format!("load({})", primary.display()),
                "load_installed".to_string(),
                format!("load({})", backup.display()),
            ]
        );
        assert_eq!(engine.handle().source(), &DriverSource::Backup(backup.clone()));
        assert_eq!(engine.handle().driver().library_path(), Some(backup));
    }

    #[test]
    fn test_loader_stops_at_primary() {
        let primary = PathBuf::from("asset/jlink/7.60b/JLink_x64.dll");
        let lib = installed(DummyConfig::default()).with_loadable(&primary);
        let monitor = lib.monitor();

        let engine = Engine::open(&lib, Some(primary.as_path()), Some(Path::new("backup.dll"))).unwrap();
        assert_eq!(
            monitor.calls(),
            vec![format!("load({})", primary.display())]
        );
        assert_eq!(engine.handle().source(), &DriverSource::Primary(primary));
    }

    #[test]
    fn test_loader_uses_installed_for_blank_paths() {
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();

        let engine = Engine::open(&lib, Some(Path::new("  ")), Some(Path::new(""))).unwrap();
        assert_eq!(monitor.calls(), vec!["load_installed".to_string()]);
        assert_eq!(engine.handle().source(), &DriverSource::Installed);
    }

    #[test]
    fn test_loader_exhausted() {
        let dir = workspace(&[("foreign.dll", &b"MZ"[..])]);
        let foreign = dir.path().join("foreign.dll");
        let lib = DummyLibrary::new(DummyConfig::default());
        let monitor = lib.monitor();

        let err = match Engine::open(&lib, Some(Path::new("/nonexistent/JLink.dll")), Some(foreign.as_path())) {
            Ok(_) => panic!("load should fail"),
            Err(e) => e,
        };
        assert_eq!(err.failures.len(), 3);
        assert!(matches!(err.failures[0].1, DriverError::LibraryNotFound(_)));
        assert_eq!(err.failures[1].1, DriverError::NotInstalled);
        assert!(matches!(err.failures[2].1, DriverError::LoadFailed { .. }));

        // No session was ever created, so nothing to close
        assert_eq!(monitor.close_count(), 0);
    }

    #[test]
    fn test_no_probe_connected() {
        let lib = installed(DummyConfig::default().with_probes(Vec::new()));
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nreset\n");
        assert!(!engine.run(script.commands(), None, None));

        assert_eq!(
            monitor.calls(),
            vec!["load_installed".to_string(), "probe_count".to_string()]
        );
        assert_eq!(journal.last().as_deref(), Some("err: no probe connected"));
    }

    #[test]
    fn test_unsupported_command_is_skipped() {
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nmem32 0x0,4\nreset\n");
        assert!(engine.run(script.commands(), None, None));

        assert!(monitor.called("reset"));
        assert!(journal
            .entries()
            .contains(&"err: unsupported command: mem32".to_string()));
        assert_eq!(journal.last().as_deref(), Some("ok: reset ret: 0"));
    }

    #[test]
    fn test_command_names_are_case_sensitive() {
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nRESET\n");
        assert!(engine.run(script.commands(), None, None));

        assert!(!monitor.called("reset"));
        assert_eq!(
            journal.last().as_deref(),
            Some("err: unsupported command: RESET")
        );
    }

    #[test]
    fn test_failed_step_aborts_script() {
        let lib = installed(DummyConfig::default().fail("reset", Fault::Reject));
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nreset\nhalt\ngo\n");
        assert!(!engine.run(script.commands(), None, None));

        assert!(monitor.called("reset"));
        assert!(!monitor.called("halt"));
        assert!(!monitor.called("restart"));
        assert_eq!(journal.last().as_deref(), Some("err: reset ret: -1"));
    }

    #[test]
    fn test_driver_error_is_reported_as_exception() {
        let lib = installed(DummyConfig::default().fail("erase", Fault::Error));
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nerase\n");
        assert!(!engine.run(script.commands(), None, None));
        assert_eq!(
            journal.last().as_deref(),
            Some("err: erase exception: erase failed with code -1")
        );
    }

    #[test]
    fn test_driver_panic_is_contained() {
        let lib = installed(DummyConfig::default().fail("halt", Fault::Panic));
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nhalt\ngo\n");
        assert!(!engine.run(script.commands(), None, None));

        assert!(!monitor.called("restart"));
        assert_eq!(
            journal.last().as_deref(),
            Some("err: halt exception: driver panicked: halt: injected fault")
        );

        // The session is still closed exactly once after a contained panic
        drop(engine);
        assert_eq!(monitor.close_count(), 1);
    }

    #[test]
    fn test_loadbin_hex_address() {
        let image = [0x11u8, 0x22, 0x33, 0x44];
        let dir = workspace(&[("fw.bin", &image[..])]);
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nloadbin fw.bin,1A00\n");
        assert!(engine.run(script.commands(), None, Some(dir.path())));

        let fw = dir.path().join("fw.bin");
        assert!(monitor.called(&format!("flash_write({}, 0x00001A00)", fw.display())));
        let memory = monitor.memory();
        assert_eq!(&memory[0x1A00..0x1A04], &image);
        assert_eq!(memory[0x19FF], 0xFF);
    }

    #[test]
    fn test_loadbin_multiple_images_in_order() {
        let dir = workspace(&[("boot.bin", &[0xB0; 16][..]), ("app.bin", &[0xA0; 16][..])]);
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nloadbin boot.bin,0x0 app.bin,0x1000\n");
        assert!(engine.run(script.commands(), None, Some(dir.path())));

        let writes: Vec<String> = monitor
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("flash_write("))
            .collect();
        assert_eq!(
            writes,
            vec![
                format!("flash_write({}, 0x00000000)", dir.path().join("boot.bin").display()),
                format!("flash_write({}, 0x00001000)", dir.path().join("app.bin").display()),
            ]
        );
        let memory = monitor.memory();
        assert_eq!(memory[0x0], 0xB0);
        assert_eq!(memory[0x1000], 0xA0);
    }

    #[test]
    fn test_loadbin_without_pairs_fails() {
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nloadbin app.bin\ngo\n");
        assert!(!engine.run(script.commands(), None, None));

        assert!(!monitor.called("flash_write"));
        assert!(!monitor.called("restart"));
        assert_eq!(
            journal.last().as_deref(),
            Some("err: loadbin: no file,address parameter")
        );
    }

    #[test]
    fn test_loadbin_outside_flash_fails() {
        let dir = workspace(&[("big.bin", &[0u8; 8192][..])]);
        let lib = installed(DummyConfig::default().with_flash(0x0800_0000, 4096));
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device STM32F4\nloadbin big.bin,0x08000000\ngo\n");
        assert!(!engine.run(script.commands(), None, Some(dir.path())));

        assert!(!monitor.called("restart"));
        let last = journal.last().unwrap();
        assert!(last.starts_with("err: flash_write("), "{}", last);
        assert!(last.ends_with("outside flash"), "{}", last);
    }

    #[test]
    fn test_close_runs_once() {
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();

        let engine = Engine::open(&lib, None, None).unwrap();
        engine.close();
        assert_eq!(monitor.close_count(), 1);

        let mut engine = Engine::open(&lib, None, None).unwrap();
        engine.handle_mut().close();
        assert!(engine.handle().is_closed());
        drop(engine);
        assert_eq!(monitor.close_count(), 2);
    }

    #[test]
    fn test_device_description_path() {
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();
        let script = Script::parse_str("device NRF52840\n");

        let mut engine = engine(&lib, &journal);
        assert!(engine.run(script.commands(), Some(Path::new("   ")), None));
        assert!(!monitor.called("set_device_description_path"));

        assert!(engine.run(script.commands(), Some(Path::new("JLinkDevices.xml")), None));
        let calls = monitor.calls();
        let xml = calls
            .iter()
            .position(|c| c == "set_device_description_path(JLinkDevices.xml)")
            .unwrap();
        assert_eq!(calls[xml - 1], "set_interface(SWD)");
        assert_eq!(calls[xml + 1], "connect(NRF52840, 10000)");
    }

    #[test]
    fn test_open_by_serial_number() {
        let lib = installed(DummyConfig::default().with_probes(vec![
            ProbeInfo::new(260101234, "J-Link PLUS"),
            ProbeInfo::new(801005678, "J-Link EDU"),
        ]));
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal).with_connect_options(ConnectOptions {
            serial_number: Some(801005678),
            disable_dialogs: false,
        });
        let script = Script::parse_str("interface JTAG\ndevice NRF52840\n");
        assert!(engine.run(script.commands(), None, None));

        assert_eq!(
            monitor.calls(),
            vec![
                "load_installed".to_string(),
                "probe_count".to_string(),
                "open(801005678)".to_string(),
                "set_interface(JTAG)".to_string(),
                "connect(NRF52840, 10000)".to_string(),
            ]
        );
    }

    #[test]
    fn test_unknown_serial_number() {
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal).with_connect_options(ConnectOptions {
            serial_number: Some(1),
            ..ConnectOptions::default()
        });
        let script = Script::parse_str("device NRF52840\nreset\n");
        assert!(!engine.run(script.commands(), None, None));

        assert!(!monitor.called("set_interface"));
        assert_eq!(
            journal.last().as_deref(),
            Some("err: open(1) exception: no probe with serial number 1")
        );
    }

    #[test]
    fn test_parameters_apply_before_any_command() {
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("reset\nspeed 100\ndevice STM32F407VG\ninterface 0\n");
        assert!(engine.run(script.commands(), None, None));

        let calls = monitor.calls();
        let connect = calls
            .iter()
            .position(|c| c == "connect(STM32F407VG, 100)")
            .unwrap();
        let reset = calls.iter().position(|c| c == "reset").unwrap();
        assert!(connect < reset);
        assert!(calls.contains(&"set_interface(JTAG)".to_string()));
    }

    #[test]
    fn test_invalid_parameter_stops_before_connect() {
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("speed fast\nreset\n");
        assert!(!engine.run(script.commands(), None, None));

        assert_eq!(monitor.calls(), vec!["load_installed".to_string()]);
        assert_eq!(
            journal.last().as_deref(),
            Some("err: speed: invalid value 'fast'")
        );
    }

    #[test]
    fn test_unsupported_device() {
        let lib = installed(DummyConfig::default().with_devices(&["NRF52840"]));
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device STM32F4\nreset\n");
        assert!(!engine.run(script.commands(), None, None));

        assert!(!monitor.called("reset"));
        assert_eq!(
            journal.last().as_deref(),
            Some("err: connect(STM32F4, 10000 kHz) exception: unsupported device: STM32F4")
        );
    }

    #[test]
    fn test_empty_command_list() {
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        assert!(!engine.run(&[], None, None));

        assert_eq!(monitor.calls(), vec!["load_installed".to_string()]);
        assert_eq!(journal.last().as_deref(), Some("err: no commands to run"));
    }

    #[test]
    fn test_script_with_wrong_extension_is_refused() {
        let dir = workspace(&[("bringup.txt", BRINGUP.as_bytes())]);
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        assert!(!engine.run_script(&dir.path().join("bringup.txt"), None, None));

        assert_eq!(monitor.calls(), vec!["load_installed".to_string()]);
        let last = journal.last().unwrap();
        assert!(last.starts_with("err: script must have a .jlink extension"), "{}", last);
    }

    #[test]
    fn test_erase_clears_flash() {
        let dir = workspace(&[("app.bin", &[0u8; 64][..])]);
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nloadbin app.bin,0x0\n");
        assert!(engine.run(script.commands(), None, Some(dir.path())));
        assert_eq!(monitor.memory()[0], 0x00);

        let script = Script::parse_str("device NRF52840\nerase\n");
        assert!(engine.run(script.commands(), None, None));
        assert!(monitor.memory().iter().all(|&b| b == 0xFF));
        assert_eq!(journal.last().as_deref(), Some("ok: erase ret: 1048576"));
    }

    #[test]
    fn test_empty_enumeration_stops_before_open() {
        let lib = installed(DummyConfig::default().with_enumerated(Vec::new()));
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nreset\n");
        assert!(!engine.run(script.commands(), Some(Path::new("JLinkDevices.xml")), None));

        assert!(monitor.called("disable_dialogs"));
        assert!(!monitor.called("open("));
        assert!(!monitor.called("set_interface"));
        assert!(!monitor.called("connect("));
        let last = journal.last().unwrap_or_default();
        assert!(last.starts_with("err: "), "{}", last);
    }

    #[test]
    fn test_rejected_interface_stops_before_connect() {
        let lib = installed(DummyConfig::default().fail("set_interface", Fault::Reject));
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nreset\n");
        assert!(!engine.run(script.commands(), Some(Path::new("JLinkDevices.xml")), None));

        assert!(monitor.called("set_interface"));
        assert!(!monitor.called("set_device_description_path"));
        assert!(!monitor.called("connect("));
        assert!(!monitor.called("reset"));
        assert_eq!(
            journal.last().as_deref(),
            Some("err: set_interface(SWD) ret: false")
        );
    }

    #[test]
    fn test_rejected_device_description_stops_before_connect() {
        let lib = installed(
            DummyConfig::default().fail("set_device_description_path", Fault::Reject),
        );
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nreset\n");
        assert!(!engine.run(script.commands(), Some(Path::new("JLinkDevices.xml")), None));

        assert!(monitor.called("set_device_description_path(JLinkDevices.xml)"));
        assert!(!monitor.called("connect("));
        assert!(!monitor.called("reset"));
        assert_eq!(
            journal.last().as_deref(),
            Some("err: set_device_description_path(JLinkDevices.xml) ret: -1")
        );
    }

    #[test]
    fn test_signed_loadbin_address_fails() {
        let dir = workspace(&[("fw.bin", &[0x11u8; 4][..])]);
        let lib = installed(DummyConfig::default());
        let monitor = lib.monitor();
        let journal = Journal::default();

        let mut engine = engine(&lib, &journal);
        let script = Script::parse_str("device NRF52840\nloadbin fw.bin,+1A\n");
        assert!(!engine.run(script.commands(), None, Some(dir.path())));

        assert!(!monitor.called("flash_write"));
        assert_eq!(
            journal.last().as_deref(),
            Some("err: loadbin: invalid address '+1A': not a hexadecimal number")
        );
    }

    #[test]
    fn test_version_panic_does_not_escape_loader() {
        let lib = installed(DummyConfig::default().fail("version", Fault::Panic));
        let monitor = lib.monitor();

        let engine = Engine::open(&lib, None, None).unwrap();
        assert_eq!(engine.handle().source(), &DriverSource::Installed);
        assert_eq!(monitor.calls(), vec!["load_installed".to_string()]);
    }
}
