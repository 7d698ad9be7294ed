//! Host platform queries
//!
//! Used to find the J-Link library and commander executable names for the
//! running OS and to check candidate locations on disk.

use std::fmt;
use std::path::{Path, PathBuf};

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Microsoft Windows
    Windows,
    /// Linux
    Linux,
    /// macOS
    MacOs,
    /// Anything else
    Other,
}

impl Platform {
    /// Platform this binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
            Platform::MacOs => "MacOSX",
            Platform::Other => "Other",
        }
    }

    /// File name of the J-Link SDK library
    pub fn driver_library_name(self) -> &'static str {
        match self {
            Platform::Windows => {
                if cfg!(target_pointer_width = "64") {
                    "JLink_x64.dll"
                } else {
                    "JLinkARM.dll"
                }
            }
            Platform::MacOs => "libjlinkarm.dylib",
            Platform::Linux | Platform::Other => "libjlinkarm.so",
        }
    }

    /// File name of the J-Link Commander executable
    pub fn commander_executable(self) -> &'static str {
        match self {
            Platform::Windows => "JLink.exe",
            _ => "JLinkExe",
        }
    }

    /// Directories the vendor installer typically uses
    pub fn default_library_dirs(self) -> Vec<PathBuf> {
        let dirs: &[&str] = match self {
            Platform::Windows => &[
                r"C:\Program Files\SEGGER\JLink",
                r"C:\Program Files (x86)\SEGGER\JLink",
            ],
            Platform::Linux => &["/opt/SEGGER/JLink", "/usr/lib", "/usr/local/lib"],
            Platform::MacOs => &["/Applications/SEGGER/JLink", "/usr/local/lib"],
            Platform::Other => &[],
        };
        dirs.iter().map(PathBuf::from).collect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `path` exists and is a regular file
pub fn is_file(path: &Path) -> bool {
    path.is_file()
}

/// First directory in `dirs` that contains the platform's driver library
pub fn locate_installed_library(platform: Platform, dirs: &[PathBuf]) -> Option<PathBuf> {
    let name = platform.driver_library_name();
    dirs.iter().map(|d| d.join(name)).find(|p| {
        let found = is_file(p);
        log::trace!("Checking {}: {}", p.display(), if found { "found" } else { "missing" });
        found
    })
}
