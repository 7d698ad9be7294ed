//! J-Link command script parsing
//!
//! Scripts are plain text, one command per line, whitespace-delimited:
//!
//! ```text
//! speed 4000
//! device NRF52840_XXAA
//! reset
//! halt
//! loadbin app.bin,0x0
//! go
//! exit
//! ```
//!
//! Parsing is lenient: blank and non-UTF-8 lines are skipped, `loadbin` parameters that are
//! not a `path,address` pair are dropped, and unknown command names are kept
//! so the dispatcher can reject them when the script runs.

use crate::error::{AddressError, ScriptError};
use std::fmt;
use std::fs;
use std::path::Path;

/// Extension a script file must carry
pub const SCRIPT_EXTENSION: &str = "jlink";

/// Command keyword at the start of a script line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// `interface <code>` - target interface selection
    Interface,
    /// `speed <kHz>` - interface speed
    Speed,
    /// `device <name>` - target chip name
    Device,
    /// `reset`
    Reset,
    /// `halt`
    Halt,
    /// `erase` - mass erase
    Erase,
    /// `loadbin <path>,<address>` - program a binary file
    LoadBin,
    /// `go` - restart the CPU
    Go,
    /// `exit` - end of script marker
    Exit,
    /// Anything else, kept verbatim
    Unknown(String),
}

impl CommandName {
    /// Map a keyword to a command name
    pub fn parse(keyword: &str) -> Self {
        match keyword {
            "interface" => CommandName::Interface,
            "speed" => CommandName::Speed,
            "device" => CommandName::Device,
            "reset" => CommandName::Reset,
            "halt" => CommandName::Halt,
            "erase" => CommandName::Erase,
            "loadbin" => CommandName::LoadBin,
            "go" => CommandName::Go,
            "exit" => CommandName::Exit,
            other => CommandName::Unknown(other.to_string()),
        }
    }

    /// Keyword as written in the script
    pub fn as_str(&self) -> &str {
        match self {
            CommandName::Interface => "interface",
            CommandName::Speed => "speed",
            CommandName::Device => "device",
            CommandName::Reset => "reset",
            CommandName::Halt => "halt",
            CommandName::Erase => "erase",
            CommandName::LoadBin => "loadbin",
            CommandName::Go => "go",
            CommandName::Exit => "exit",
            CommandName::Unknown(s) => s,
        }
    }

    /// Commands consumed while building connection parameters
    pub fn is_connection_parameter(&self) -> bool {
        matches!(
            self,
            CommandName::Interface | CommandName::Speed | CommandName::Device
        )
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `loadbin` parameter: a file and the address to program it at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParam {
    /// File path as written in the script
    pub path: String,
    /// Address as written in the script (hex, optional `0x` prefix)
    pub address: String,
}

impl ImageParam {
    /// Parse the address as base-16; signs are not accepted
    pub fn parse_address(&self) -> Result<u32, AddressError> {
        let s = self.address.trim();
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError::NotHex);
        }
        u32::from_str_radix(hex, 16).map_err(|_| AddressError::Overflow)
    }
}

impl fmt::Display for ImageParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.path, self.address)
    }
}

/// A single command parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// Plain token
    Value(String),
    /// `path,address` pair (only for `loadbin`)
    Image(ImageParam),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Value(v) => f.write_str(v),
            Param::Image(img) => write!(f, "{}", img),
        }
    }
}

/// One parsed script line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: CommandName,
    params: Vec<Param>,
}

impl Command {
    /// Create a command
    pub fn new(name: CommandName, params: Vec<Param>) -> Self {
        Self { name, params }
    }

    /// Parse a single line, returning `None` for blank lines
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let name = CommandName::parse(tokens.next()?);

        let params = if name == CommandName::LoadBin {
            tokens
                .filter_map(|token| {
                    let mut parts = token.split(',');
                    match (parts.next(), parts.next()) {
                        (Some(path), Some(address)) => Some(Param::Image(ImageParam {
                            path: path.to_string(),
                            address: address.to_string(),
                        })),
                        _ => {
                            log::debug!("loadbin: dropping parameter without address: {}", token);
                            None
                        }
                    }
                })
                .collect()
        } else {
            tokens.map(|t| Param::Value(t.to_string())).collect()
        };

        Some(Self { name, params })
    }

    /// Command name
    pub fn name(&self) -> &CommandName {
        &self.name
    }

    /// All parameters in script order
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// First plain parameter, if any
    pub fn first_value(&self) -> Option<&str> {
        self.params.iter().find_map(|p| match p {
            Param::Value(v) => Some(v.as_str()),
            Param::Image(_) => None,
        })
    }

    /// `loadbin` image pairs in script order
    pub fn images(&self) -> impl Iterator<Item = &ImageParam> {
        self.params.iter().filter_map(|p| match p {
            Param::Image(img) => Some(img),
            Param::Value(_) => None,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())?;
        for p in &self.params {
            write!(f, " {}", p)?;
        }
        Ok(())
    }
}

/// An ordered list of commands read from one script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    commands: Vec<Command>,
}

impl Script {
    /// Parse script text
    pub fn parse_str(text: &str) -> Self {
        Self {
            commands: text.lines().filter_map(Command::parse_line).collect(),
        }
    }

    /// Parse raw script bytes, skipping lines that are not valid UTF-8
    pub fn parse_bytes(bytes: &[u8]) -> Self {
        let commands = bytes
            .split(|&b| b == b'\n')
            .enumerate()
            .filter_map(|(i, line)| match std::str::from_utf8(line) {
                Ok(line) => Command::parse_line(line),
                Err(e) => {
                    log::warn!("Skipping line {}: not valid UTF-8 ({})", i + 1, e);
                    None
                }
            })
            .collect();
        Self { commands }
    }

    /// Read and parse a script file
    ///
    /// The path must exist, be a regular file and end in `.jlink`.
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        if !path.exists() {
            return Err(ScriptError::NotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ScriptError::NotAFile(path.to_path_buf()));
        }
        if path.extension().and_then(|e| e.to_str()) != Some(SCRIPT_EXTENSION) {
            return Err(ScriptError::BadExtension {
                path: path.to_path_buf(),
                extension: SCRIPT_EXTENSION,
            });
        }

        let bytes = fs::read(path)?;
        let script = Self::parse_bytes(&bytes);
        log::debug!("Parsed {} command(s) from {}", script.len(), path.display());
        Ok(script)
    }

    /// Commands in file order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Take ownership of the commands
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the script has no commands
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Parse a script file, logging and returning no commands if it is refused
pub fn parse(path: &Path) -> Vec<Command> {
    match Script::from_file(path) {
        Ok(script) => script.into_commands(),
        Err(e) => {
            log::error!("{}", e);
            Vec::new()
        }
    }
}
