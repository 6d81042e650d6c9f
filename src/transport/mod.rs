//! Network transport for release downloads.
//!
//! Two concrete transports implement the same contract: the primary one
//! carries connect/overall timeouts and redirect following; the fallback is a
//! minimal best-effort client used when the configured client cannot be
//! built. Callers depend on the [`Transport`] trait only.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, redirect};
use std::io::Write;
use std::time::Duration;

/// Time allowed to establish a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for a whole request, including the body transfer.
pub const OVERALL_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("fwi/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait Transport: Send + Sync {
    /// Streams the response body for `url` into `writer`, returning the
    /// number of bytes written. Non-2xx responses are failures.
    async fn fetch(&self, url: &str, writer: &mut (dyn Write + Send)) -> Result<u64>;

    /// Fetches `url` as a small text payload. Non-2xx responses are failures.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Full-featured transport: timeouts and redirect following.
pub struct PrimaryTransport {
    client: Client,
}

impl PrimaryTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(OVERALL_TIMEOUT)
            .redirect(redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for PrimaryTransport {
    async fn fetch(&self, url: &str, writer: &mut (dyn Write + Send)) -> Result<u64> {
        fetch_with(&self.client, url, writer).await
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        fetch_text_with(&self.client, url).await
    }
}

/// Minimal best-effort transport with no configured timeouts.
pub struct FallbackTransport {
    client: Client,
}

impl FallbackTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for FallbackTransport {
    async fn fetch(&self, url: &str, writer: &mut (dyn Write + Send)) -> Result<u64> {
        fetch_with(&self.client, url, writer).await
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        fetch_text_with(&self.client, url).await
    }
}

/// Picks the primary transport when it can be constructed, falling back to
/// the minimal one otherwise.
#[tracing::instrument]
pub fn select() -> Result<Box<dyn Transport>> {
    match PrimaryTransport::new() {
        Ok(transport) => Ok(Box::new(transport)),
        Err(e) => {
            warn!("Falling back to minimal transport: {}", e);
            let transport =
                FallbackTransport::new().context("Failed to construct any HTTP client")?;
            Ok(Box::new(transport))
        }
    }
}

async fn fetch_with(client: &Client, url: &str, writer: &mut (dyn Write + Send)) -> Result<u64> {
    debug!("GET {}...", url);

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send request")?;

    let mut response = response
        .error_for_status()
        .context("Server returned an error status")?;

    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read chunk from download stream")?
    {
        writer
            .write_all(&chunk)
            .context("Failed to write chunk to file")?;
        written += chunk.len() as u64;
    }

    debug!("Downloaded {:.2} MB", written as f64 / (1024.0 * 1024.0));

    Ok(written)
}

async fn fetch_text_with(client: &Client, url: &str) -> Result<String> {
    debug!("GET {}...", url);

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send request")?;

    let response = response
        .error_for_status()
        .context("Server returned an error status")?;

    response.text().await.context("Failed to read response body")
}
