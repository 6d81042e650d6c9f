//! Installer configuration: release coordinates, host, install directory.

use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;

use crate::release::ReleaseCoordinates;
use crate::runtime::Runtime;

/// GitHub repository the release binaries are published from.
pub const DEFAULT_REPOSITORY: &str = "filewatcher-io/filewatcher";

/// Release host; overridable for tests and mirrors.
pub const DEFAULT_BASE_URL: &str = "https://github.com";

/// The release tag tracks this crate's own version: installer releases are
/// cut alongside artifact releases.
pub const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The single immutable configuration value for one installer run,
/// constructed once at process start and passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub coordinates: ReleaseCoordinates,
    pub base_url: String,
    pub install_dir: PathBuf,
}

impl Config {
    pub fn new<R: Runtime>(
        runtime: &R,
        install_dir: Option<PathBuf>,
        base_url: Option<String>,
        tag: Option<String>,
        repository: Option<String>,
    ) -> Result<Self> {
        let install_dir = match install_dir {
            Some(dir) => dir,
            None => default_install_dir(runtime)?,
        };

        let coordinates = ReleaseCoordinates::new(
            repository.unwrap_or_else(|| DEFAULT_REPOSITORY.to_string()),
            tag.as_deref().unwrap_or(DEFAULT_VERSION),
        );
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        debug!(
            "Configured {} {} -> {:?}",
            coordinates.repository, coordinates.version, install_dir
        );

        Ok(Self {
            coordinates,
            base_url,
            install_dir,
        })
    }
}

/// `/usr/local/bin` when running privileged, `~/.local/bin` otherwise.
pub(crate) fn default_install_dir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        return Ok(PathBuf::from("/usr/local/bin"));
    }
    let home = runtime
        .home_dir()
        .context("Could not determine home directory")?;
    Ok(home.join(".local").join("bin"))
}
