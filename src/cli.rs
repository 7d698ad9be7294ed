//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a probe serial number (decimal, as printed on the probe label)
fn parse_serial(s: &str) -> Result<u32, String> {
    s.trim()
        .parse::<u32>()
        .map_err(|e| format!("Invalid serial number: {}", e))
}

#[derive(Parser)]
#[command(name = "jflasher")]
#[command(author, version, about = "J-Link script runner", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Session file (TOML) with driver, connect and script settings
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Driver selection options shared across commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DriverArgs {
    /// Driver backend (see list-drivers)
    #[arg(short, long)]
    pub driver: Option<String>,

    /// Primary J-Link library to load
    #[arg(long)]
    pub dll: Option<PathBuf>,

    /// Library to load if neither the primary nor the installed one loads
    #[arg(long)]
    pub backup_dll: Option<PathBuf>,
}

/// Probe connection options
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// Open the probe with this serial number instead of the first one found
    #[arg(short, long, value_parser = parse_serial)]
    pub serial: Option<u32>,

    /// Device description XML loaded before connecting
    #[arg(long)]
    pub device_xml: Option<PathBuf>,

    /// Allow the driver to show dialog boxes
    #[arg(long)]
    pub allow_dialogs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a J-Link command script
    Run {
        /// Script file (.jlink)
        script: PathBuf,

        #[command(flatten)]
        driver: DriverArgs,

        #[command(flatten)]
        connect: ConnectArgs,

        /// Directory loadbin paths are relative to (default: the script's directory)
        #[arg(short, long)]
        base_path: Option<PathBuf>,

        /// Don't show progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Parse a script and print its commands
    Parse {
        /// Script file (.jlink)
        script: PathBuf,
    },

    /// List attached probes
    ListProbes {
        #[command(flatten)]
        driver: DriverArgs,
    },

    /// List available driver backends
    ListDrivers,

    /// Show platform and driver library information
    Info {
        #[command(flatten)]
        driver: DriverArgs,
    },
}
