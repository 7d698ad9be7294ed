//! jflasher - Scripted J-Link flashing
//!
//! Runs J-Link command scripts (`.jlink` files) against a target: the
//! connection parameters are taken from the script, the probe is opened and
//! connected, and the remaining commands (reset, halt, erase, loadbin, go)
//! are executed in order.
//!
//! # Architecture
//!
//! - **jflasher-core** - script parser, driver loader with fallback,
//!   connection manager, command dispatcher and status reporting
//! - **driver backends** - crates implementing the core `DriverLibrary`
//!   trait, selected with `--driver` (see `jflasher list-drivers`)

mod cli;
mod commands;
mod drivers;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{DriverSelection, RunOptions};
use jflasher_core::config::SessionConfig;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = match &cli.config {
        Some(path) => {
            let config = SessionConfig::from_toml_file(path)?;
            log::debug!("Loaded session config from {}", path.display());
            config
        }
        None => SessionConfig::default(),
    };

    match cli.command {
        Commands::Run {
            script,
            driver,
            connect,
            base_path,
            no_progress,
        } => {
            let opts = RunOptions {
                script,
                driver: DriverSelection::resolve(&driver, &config),
                connect: commands::connect_options(&connect, &config),
                device_xml: connect
                    .device_xml
                    .clone()
                    .or_else(|| config.connect.device_xml.clone()),
                base_path: base_path.or_else(|| config.script.base_path.clone()),
                progress: !no_progress,
            };
            commands::run_script(&opts)
        }
        Commands::Parse { script } => commands::parse_script(&script),
        Commands::ListProbes { driver } => {
            commands::list_probes(&DriverSelection::resolve(&driver, &config))
        }
        Commands::ListDrivers => {
            commands::list_drivers();
            Ok(())
        }
        Commands::Info { driver } => commands::show_info(&DriverSelection::resolve(&driver, &config)),
    }
}
