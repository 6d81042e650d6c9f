//! Platform detection for release asset selection.
//!
//! Release binaries are published per `(os, arch)` pair; this module maps the
//! tokens the running machine reports to the canonical tokens used in asset
//! names, failing when no binary is published for the combination.

use std::env::consts;
use std::fmt;

/// Canonical operating-system token used in release asset names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    Darwin,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical CPU-architecture token used in release asset names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(os, arch)` pair release binaries are named after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    /// Resolve the running machine against the supported platform table.
    pub fn resolve() -> Result<Self, UnsupportedPlatform> {
        Self::from_raw(consts::OS, consts::ARCH)
    }

    /// Map raw OS and architecture tokens to their canonical release tokens.
    ///
    /// Accepts both the uname-style spellings used in published checksums
    /// (`Linux`, `Darwin`, `amd64`) and the tokens the Rust runtime reports
    /// (`linux`, `macos`, `x86_64`, `aarch64`).
    pub fn from_raw(raw_os: &str, raw_arch: &str) -> Result<Self, UnsupportedPlatform> {
        let os = match raw_os {
            "linux" | "Linux" => Some(Os::Linux),
            "macos" | "darwin" | "Darwin" => Some(Os::Darwin),
            _ => None,
        };
        let arch = match raw_arch {
            "x86_64" | "amd64" => Some(Arch::Amd64),
            "aarch64" | "arm64" => Some(Arch::Arm64),
            _ => None,
        };
        match (os, arch) {
            (Some(os), Some(arch)) => Ok(Platform { os, arch }),
            _ => Err(UnsupportedPlatform {
                raw_os: raw_os.to_string(),
                raw_arch: raw_arch.to_string(),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// No release binary is published for the reported platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedPlatform {
    pub raw_os: String,
    pub raw_arch: String,
}

impl fmt::Display for UnsupportedPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No release binaries are published for this platform (os: {}, arch: {})",
            self.raw_os, self.raw_arch
        )
    }
}

impl std::error::Error for UnsupportedPlatform {}
