//! `run` command: execute a script against a probe

use super::DriverSelection;
use crate::drivers::{self, CliError};
use indicatif::{ProgressBar, ProgressStyle};
use jflasher_core::connection::ConnectOptions;
use jflasher_core::engine::Engine;
use jflasher_core::report::{ProgressSink, StatusSink};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Everything a script run needs, after merging flags and session file
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub script: PathBuf,
    pub driver: DriverSelection,
    pub connect: ConnectOptions,
    pub device_xml: Option<PathBuf>,
    /// Defaults to the script's directory
    pub base_path: Option<PathBuf>,
    pub progress: bool,
}

/// Counts step outcomes for the closing summary
#[derive(Default)]
struct StepTally {
    ok: AtomicUsize,
    failed: AtomicUsize,
}

impl StatusSink for StepTally {
    fn status(&self, ok: bool, _message: &str) {
        let counter = if ok { &self.ok } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// One progress bar per flash phase (compare, erase, program, verify)
struct PhaseBars {
    style: ProgressStyle,
    current: Mutex<Option<(String, ProgressBar)>>,
}

impl PhaseBars {
    fn new() -> Result<Self, indicatif::style::TemplateError> {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("#>-");
        Ok(Self {
            style,
            current: Mutex::new(None),
        })
    }

    fn finish(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, pb)) = current.take() {
            pb.finish();
        }
    }
}

impl ProgressSink for PhaseBars {
    fn progress(&self, percent: u8, action: &str, detail: &str) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        let same_phase = matches!(&*current, Some((phase, _)) if phase == action);
        if !same_phase {
            if let Some((_, pb)) = current.take() {
                pb.finish();
            }
            let pb = ProgressBar::new(100);
            pb.set_style(self.style.clone());
            pb.set_message(format!("{} {}", action, detail));
            *current = Some((action.to_string(), pb));
        }

        if let Some((_, pb)) = &*current {
            pb.set_position(u64::from(percent));
        }
    }
}

fn default_base_path(script: &Path) -> Option<PathBuf> {
    script
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// Run a script file
pub fn run_script(opts: &RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let library = drivers::open_library(opts.driver.backend.as_deref())?;

    let tally = Arc::new(StepTally::default());
    let mut engine = Engine::open(library.as_ref(), opts.driver.primary(), opts.driver.backup())?
        .with_status_sink(tally.clone())
        .with_connect_options(opts.connect.clone());

    let bars = if opts.progress {
        let bars = Arc::new(PhaseBars::new()?);
        engine = engine.with_progress_sink(bars.clone());
        Some(bars)
    } else {
        None
    };

    let base_path = opts
        .base_path
        .clone()
        .or_else(|| default_base_path(&opts.script));
    let ok = engine.run_script(
        &opts.script,
        opts.device_xml.as_deref(),
        base_path.as_deref(),
    );
    engine.close();

    if let Some(bars) = bars {
        bars.finish();
    }

    let passed = tally.ok.load(Ordering::Relaxed);
    let failed = tally.failed.load(Ordering::Relaxed);
    println!("{} step(s) ok, {} failed", passed, failed);

    if ok {
        println!("Script {} completed", opts.script.display());
        Ok(())
    } else {
        Err(CliError::ScriptFailed(opts.script.clone()).into())
    }
}
