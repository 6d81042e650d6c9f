//! Release coordinates and the asset locations derived from them.

use std::path::{Path, PathBuf};

use crate::platform::Platform;

/// Name of the binary published in each release and installed locally.
pub const PACKAGE: &str = "filewatcher";

/// The repository and release tag the installer targets.
///
/// Fixed at configuration time and read-only for the run's duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCoordinates {
    pub repository: String,
    pub version: String,
}

impl ReleaseCoordinates {
    /// The stored version never carries a leading `v`; the prefix is added
    /// back when building release URLs.
    pub fn new(repository: impl Into<String>, version: &str) -> Self {
        Self {
            repository: repository.into(),
            version: version.trim_start_matches('v').to_string(),
        }
    }
}

/// Everything needed to locate, fetch, and place one release artifact.
///
/// Derived deterministically from the platform and coordinates; recomputed
/// each run, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub asset_name: String,
    pub base_url: String,
    pub binary_url: String,
    pub checksum_url: String,
    pub destination_path: PathBuf,
}

impl ReleaseAsset {
    pub fn derive(
        coordinates: &ReleaseCoordinates,
        platform: &Platform,
        host: &str,
        install_dir: &Path,
    ) -> Self {
        let asset_name = format!("{}-{}-{}", PACKAGE, platform.os, platform.arch);
        let base_url = format!(
            "{}/{}/releases/download/v{}",
            host.trim_end_matches('/'),
            coordinates.repository,
            coordinates.version
        );
        let binary_url = format!("{}/{}", base_url, asset_name);
        let checksum_url = format!("{}.sha256", binary_url);
        let destination_path = install_dir.join(PACKAGE);
        Self {
            asset_name,
            base_url,
            binary_url,
            checksum_url,
            destination_path,
        }
    }

    /// Temporary path the artifact is downloaded to before the final rename.
    pub fn staging_path(&self) -> PathBuf {
        self.destination_path.with_extension("part")
    }
}
