//! Downloads a release artifact to a local file.

use anyhow::Context;
use log::{info, warn};
use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::runtime::Runtime;
use crate::transport::Transport;

/// A download failed; no file remains at the requested destination.
#[derive(Debug)]
pub struct DownloadError {
    pub url: String,
    source: anyhow::Error,
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to download {}: {:#}", self.url, self.source)
    }
}

impl std::error::Error for DownloadError {}

/// Streams `url` into `destination`.
///
/// On any failure the destination file is deleted if it was created, so a
/// failed download never leaves partial bytes behind.
#[tracing::instrument(skip(runtime, transport))]
pub async fn download_file<R: Runtime>(
    runtime: &R,
    transport: &dyn Transport,
    url: &str,
    destination: &Path,
) -> Result<(), DownloadError> {
    info!("Downloading {} to {:?}...", url, destination);

    if let Err(source) = fetch_to(runtime, transport, url, destination).await {
        if runtime.exists(destination) {
            if let Err(e) = runtime.remove_file(destination) {
                warn!("Failed to remove partial download at {:?}: {}", destination, e);
            }
        }
        return Err(DownloadError {
            url: url.to_string(),
            source,
        });
    }

    info!("Download complete.");
    Ok(())
}

async fn fetch_to<R: Runtime>(
    runtime: &R,
    transport: &dyn Transport,
    url: &str,
    destination: &Path,
) -> anyhow::Result<()> {
    let mut writer = runtime
        .create_file(destination)
        .with_context(|| format!("Failed to create file at {:?}", destination))?;
    transport.fetch(url, &mut *writer).await?;
    writer.flush().context("Failed to flush downloaded bytes")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use crate::transport::PrimaryTransport;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_download_file_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/filewatcher-linux-amd64")
            .with_status(200)
            .with_body("binary content")
            .create_async()
            .await;

        let destination = PathBuf::from("/tmp/filewatcher.part");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_create_file()
            .with(eq(destination.clone()))
            .returning(|_| Ok(Box::new(std::io::sink())));

        let transport = PrimaryTransport::new().unwrap();
        let result = download_file(
            &runtime,
            &transport,
            &format!("{}/filewatcher-linux-amd64", url),
            &destination,
        )
        .await;

        mock.assert_async().await;
        assert!(result.is_ok());
    }

    #[test_log::test(tokio::test)]
    async fn test_download_file_not_found_removes_partial_file() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/filewatcher-linux-amd64")
            .with_status(404)
            .create_async()
            .await;

        let destination = PathBuf::from("/tmp/filewatcher.part");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_create_file()
            .with(eq(destination.clone()))
            .returning(|_| Ok(Box::new(std::io::sink())));
        runtime
            .expect_exists()
            .with(eq(destination.clone()))
            .returning(|_| true);
        runtime
            .expect_remove_file()
            .with(eq(destination.clone()))
            .times(1)
            .returning(|_| Ok(()));

        let transport = PrimaryTransport::new().unwrap();
        let result = download_file(
            &runtime,
            &transport,
            &format!("{}/filewatcher-linux-amd64", url),
            &destination,
        )
        .await;

        mock.assert_async().await;
        let err = result.unwrap_err();
        assert!(err.url.ends_with("/filewatcher-linux-amd64"));
        assert!(err.to_string().contains("Failed to download"));
    }

    #[tokio::test]
    async fn test_download_file_create_failure() {
        // No server interaction needed; file creation fails first.
        let destination = PathBuf::from("/nonexistent/dir/filewatcher.part");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_create_file()
            .returning(|_| Err(anyhow::anyhow!("permission denied")));
        runtime
            .expect_exists()
            .with(eq(destination.clone()))
            .returning(|_| false);

        let transport = PrimaryTransport::new().unwrap();
        let result = download_file(&runtime, &transport, "http://127.0.0.1:1/x", &destination).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }
}
