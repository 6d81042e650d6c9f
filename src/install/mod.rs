//! Top-level install orchestration.
//!
//! Sequences platform resolution, asset derivation, download, checksum
//! verification, and final placement. The artifact is staged next to its
//! destination and only renamed into place after verification, so the
//! destination never holds a partially written or integrity-failed file.

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::{
    checksum::{self, VerificationOutcome},
    download::download_file,
    platform::Platform,
    release::ReleaseAsset,
    runtime::Runtime,
    transport::{self, Transport},
};

pub mod config;

use config::Config;

/// Runs one install with the given overrides, selecting the transport and
/// building the configuration at startup.
#[tracing::instrument(skip(runtime, install_dir, base_url, tag, repository))]
pub async fn install<R: Runtime + 'static>(
    runtime: R,
    install_dir: Option<PathBuf>,
    base_url: Option<String>,
    tag: Option<String>,
    repository: Option<String>,
) -> Result<()> {
    let config = Config::new(&runtime, install_dir, base_url, tag, repository)?;
    let transport = transport::select()?;
    Installer::new(runtime, transport).install(&config).await
}

pub struct Installer<R: Runtime> {
    pub runtime: R,
    pub transport: Box<dyn Transport>,
}

impl<R: Runtime + 'static> Installer<R> {
    pub fn new(runtime: R, transport: Box<dyn Transport>) -> Self {
        Self { runtime, transport }
    }

    #[tracing::instrument(skip(self, config))]
    pub async fn install(&self, config: &Config) -> Result<()> {
        let platform = Platform::resolve()?;
        debug!("Resolved platform: {}", platform);

        let asset = ReleaseAsset::derive(
            &config.coordinates,
            &platform,
            &config.base_url,
            &config.install_dir,
        );

        if !self.runtime.exists(&config.install_dir) {
            self.runtime
                .create_dir_all(&config.install_dir)
                .with_context(|| {
                    format!("Failed to create install directory {:?}", config.install_dir)
                })?;
        }

        let staging = asset.staging_path();

        println!(" downloading {}", asset.binary_url);
        download_file(
            &self.runtime,
            self.transport.as_ref(),
            &asset.binary_url,
            &staging,
        )
        .await?;

        println!("   verifying {}", asset.checksum_url);
        match checksum::verify(
            &self.runtime,
            self.transport.as_ref(),
            &staging,
            &asset.checksum_url,
        )
        .await?
        {
            VerificationOutcome::Verified => {
                info!("Checksum verified for {}", asset.asset_name);
            }
            VerificationOutcome::SkippedNoChecksum => {}
        }

        if let Err(e) = self.place(&asset, &staging) {
            if self.runtime.exists(&staging) {
                let _ = self.runtime.remove_file(&staging);
            }
            return Err(e);
        }

        println!(
            "   installed {} {}",
            asset.asset_name,
            asset.destination_path.display()
        );

        Ok(())
    }

    /// Makes the staged artifact executable and renames it over the
    /// destination. Rename within one directory overwrites atomically.
    fn place(&self, asset: &ReleaseAsset, staging: &Path) -> Result<()> {
        self.runtime
            .set_permissions(staging, 0o755)
            .with_context(|| format!("Failed to set executable permissions on {:?}", staging))?;
        self.runtime
            .rename(staging, &asset.destination_path)
            .with_context(|| {
                format!(
                    "Failed to move artifact into place at {:?}",
                    asset.destination_path
                )
            })?;
        Ok(())
    }
}
