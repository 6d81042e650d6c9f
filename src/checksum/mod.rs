//! Checksum retrieval and verification for downloaded artifacts.
//!
//! Checksum files follow the `<hex-digest> <filename>` convention; only the
//! first whitespace-delimited token is consulted. An unreachable or empty
//! checksum resource downgrades the install to unverified instead of failing
//! it; a digest mismatch is fatal and removes the artifact.

use anyhow::{Context, Result};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::runtime::Runtime;
use crate::transport::Transport;

const READ_BUF_SIZE: usize = 64 * 1024;

/// Result of a completed verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The artifact's digest matched the published checksum.
    Verified,
    /// The checksum resource was unavailable; the artifact was not checked.
    SkippedNoChecksum,
}

/// The artifact's digest did not match the published checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumMismatch {
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for ChecksumMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Checksum mismatch for downloaded artifact: expected {}, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for ChecksumMismatch {}

/// Checks `binary_path` against the digest published at `checksum_url`.
///
/// A mismatch removes the file before the error propagates, so a failed
/// verification never leaves the artifact on disk.
#[tracing::instrument(skip(runtime, transport))]
pub async fn verify<R: Runtime>(
    runtime: &R,
    transport: &dyn Transport,
    binary_path: &Path,
    checksum_url: &str,
) -> Result<VerificationOutcome> {
    let payload = match transport.fetch_text(checksum_url).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                "Checksum unavailable at {} ({:#}); installing unverified artifact",
                checksum_url, e
            );
            return Ok(VerificationOutcome::SkippedNoChecksum);
        }
    };

    let Some(expected) = parse_expected(&payload) else {
        warn!(
            "Checksum payload at {} is empty; installing unverified artifact",
            checksum_url
        );
        return Ok(VerificationOutcome::SkippedNoChecksum);
    };

    let actual = sha256_file(runtime, binary_path)?;

    if digests_match(&expected, &actual) {
        debug!("Checksum verified: {}", actual);
        return Ok(VerificationOutcome::Verified);
    }

    runtime.remove_file(binary_path).with_context(|| {
        format!(
            "Failed to remove artifact failing verification at {:?}",
            binary_path
        )
    })?;
    Err(ChecksumMismatch { expected, actual }.into())
}

/// Computes the SHA-256 of a file and returns the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded.
pub fn sha256_file<R: Runtime>(runtime: &R, path: &Path) -> Result<String> {
    let mut reader = runtime
        .open(path)
        .with_context(|| format!("Failed to open {:?} for hashing", path))?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// First whitespace-delimited token of the trimmed payload, lowercased.
fn parse_expected(payload: &str) -> Option<String> {
    payload
        .split_whitespace()
        .next()
        .map(|token| token.to_ascii_lowercase())
}

/// Compares two hex digests in constant time.
fn digests_match(expected: &str, actual: &str) -> bool {
    let (a, b) = (expected.as_bytes(), actual.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::transport::PrimaryTransport;
    use mockall::predicate::eq;
    use std::io::Cursor;
    use std::io::Write;
    use std::path::PathBuf;

    fn hex_sha256(content: &[u8]) -> String {
        hex::encode(Sha256::digest(content))
    }

    #[test]
    fn test_parse_expected_digest_and_filename() {
        let payload = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03  filewatcher-linux-amd64\n";
        assert_eq!(
            parse_expected(payload).unwrap(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn test_parse_expected_bare_digest() {
        assert_eq!(parse_expected("abc123\n").unwrap(), "abc123");
    }

    #[test]
    fn test_parse_expected_lowercases() {
        assert_eq!(parse_expected("ABC123  file").unwrap(), "abc123");
    }

    #[test]
    fn test_parse_expected_empty_payload() {
        assert_eq!(parse_expected(""), None);
        assert_eq!(parse_expected("   \n"), None);
    }

    #[test]
    fn test_digests_match() {
        assert!(digests_match("abc123", "abc123"));
        assert!(!digests_match("abc123", "abc124"));
        assert!(!digests_match("abc123", "abc1234"));
        assert!(!digests_match("", "abc123"));
        assert!(digests_match("", ""));
    }

    #[test]
    fn test_sha256_file_empty() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let digest = sha256_file(&RealRuntime, file.path()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_file_known_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello\n").unwrap();
        file.flush().unwrap();
        let digest = sha256_file(&RealRuntime, file.path()).unwrap();
        assert_eq!(
            digest,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[tokio::test]
    async fn test_verify_matching_digest() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let content = b"binary content".to_vec();
        let mock = server
            .mock("GET", "/filewatcher-linux-amd64.sha256")
            .with_status(200)
            .with_body(format!("{}  filewatcher-linux-amd64\n", hex_sha256(&content)))
            .create_async()
            .await;

        let binary_path = PathBuf::from("/tmp/filewatcher.part");
        let mut runtime = MockRuntime::new();
        let reader_content = content.clone();
        runtime
            .expect_open()
            .with(eq(binary_path.clone()))
            .returning(move |_| Ok(Box::new(Cursor::new(reader_content.clone()))));

        let transport = PrimaryTransport::new().unwrap();
        let outcome = verify(
            &runtime,
            &transport,
            &binary_path,
            &format!("{}/filewatcher-linux-amd64.sha256", url),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(outcome, VerificationOutcome::Verified);
    }

    #[test_log::test(tokio::test)]
    async fn test_verify_mismatch_removes_artifact() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let wrong = "0".repeat(64);
        let mock = server
            .mock("GET", "/filewatcher-linux-amd64.sha256")
            .with_status(200)
            .with_body(format!("{}  filewatcher-linux-amd64\n", wrong))
            .create_async()
            .await;

        let binary_path = PathBuf::from("/tmp/filewatcher.part");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_open()
            .with(eq(binary_path.clone()))
            .returning(|_| Ok(Box::new(Cursor::new(b"binary content".to_vec()))));
        runtime
            .expect_remove_file()
            .with(eq(binary_path.clone()))
            .times(1)
            .returning(|_| Ok(()));

        let transport = PrimaryTransport::new().unwrap();
        let result = verify(
            &runtime,
            &transport,
            &binary_path,
            &format!("{}/filewatcher-linux-amd64.sha256", url),
        )
        .await;

        mock.assert_async().await;
        let err = result.unwrap_err();
        let mismatch = err.downcast_ref::<ChecksumMismatch>().unwrap();
        assert_eq!(mismatch.expected, wrong);
        assert_eq!(mismatch.actual, hex_sha256(b"binary content"));
    }

    #[tokio::test]
    async fn test_verify_unreachable_checksum_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/filewatcher-linux-amd64.sha256")
            .with_status(404)
            .create_async()
            .await;

        // No expectations: the artifact must not be read or removed.
        let runtime = MockRuntime::new();

        let transport = PrimaryTransport::new().unwrap();
        let outcome = verify(
            &runtime,
            &transport,
            &PathBuf::from("/tmp/filewatcher.part"),
            &format!("{}/filewatcher-linux-amd64.sha256", url),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(outcome, VerificationOutcome::SkippedNoChecksum);
    }

    #[tokio::test]
    async fn test_verify_blank_payload_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/filewatcher-linux-amd64.sha256")
            .with_status(200)
            .with_body("   \n")
            .create_async()
            .await;

        let runtime = MockRuntime::new();

        let transport = PrimaryTransport::new().unwrap();
        let outcome = verify(
            &runtime,
            &transport,
            &PathBuf::from("/tmp/filewatcher.part"),
            &format!("{}/filewatcher-linux-amd64.sha256", url),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(outcome, VerificationOutcome::SkippedNoChecksum);
    }

    #[tokio::test]
    async fn test_verify_uppercase_published_digest_matches() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let content = b"binary content".to_vec();
        let mock = server
            .mock("GET", "/filewatcher-linux-amd64.sha256")
            .with_status(200)
            .with_body(hex_sha256(&content).to_uppercase())
            .create_async()
            .await;

        let binary_path = PathBuf::from("/tmp/filewatcher.part");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_open()
            .with(eq(binary_path.clone()))
            .returning(move |_| Ok(Box::new(Cursor::new(content.clone()))));

        let transport = PrimaryTransport::new().unwrap();
        let outcome = verify(
            &runtime,
            &transport,
            &binary_path,
            &format!("{}/filewatcher-linux-amd64.sha256", url),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(outcome, VerificationOutcome::Verified);
    }
}
