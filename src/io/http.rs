//! HTTP Range request reader for remote archives.
//!
//! Implements random-access reading over HTTP using the Range request
//! header (RFC 7233), so individual files can be pulled out of a large
//! remote archive without downloading the whole thing.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ReadAt;
use anyhow::{Context, Result, bail};

/// Per-request timeout for both the size probe and range reads.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Give up after this many transient network failures on one read.
const MAX_RETRIES: u32 = 8;

/// HTTP Range reader for remote archives.
///
/// The server must support Range requests. The total size is discovered
/// up front, preferably from a HEAD response; servers that refuse HEAD
/// are probed with a one-byte range GET and the size is taken from the
/// `Content-Range` total.
///
/// Transient network errors (timeouts, connection resets) are retried
/// with a linear backoff, and all bytes received are counted so the
/// driver can report transfer statistics.
#[derive(Debug)]
pub struct HttpRangeReader {
    /// HTTP client with connection pooling
    client: Client,
    /// The URL of the remote archive
    url: String,
    /// Total size of the remote file in bytes
    size: u64,
    /// Cumulative bytes transferred from the network
    transferred_bytes: AtomicU64,
}

impl HttpRangeReader {
    /// Create a reader for the given URL, probing the server for range
    /// support and the file size.
    ///
    /// # Errors
    ///
    /// Fails when the server is unreachable, rejects range requests, or
    /// reports no usable size.
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let size = Self::probe_size(&client, &url)
            .await
            .with_context(|| format!("probing {url}"))?;

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: AtomicU64::new(0),
        })
    }

    /// Discover the remote size: HEAD first, range-probe GET as fallback.
    async fn probe_size(client: &Client, url: &str) -> Result<u64> {
        let resp = client.head(url).send().await?;
        if resp.status().is_success() {
            let accepts_ranges = resp
                .headers()
                .get("accept-ranges")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("bytes"));
            let length = resp
                .headers()
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());

            if accepts_ranges && let Some(size) = length {
                return Ok(size);
            }
        }

        // Some servers answer HEAD without Accept-Ranges or a length but
        // still honor Range on GET; a one-byte probe settles it.
        let resp = client
            .get(url)
            .header("Range", "bytes=0-0")
            .send()
            .await?;
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            bail!("remote server does not support Range requests");
        }

        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|total| total.parse::<u64>().ok())
            .ok_or_else(|| anyhow::anyhow!("remote server did not report a file size"))
    }

    /// Total bytes received from the server so far.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    /// Read data at the specified offset using HTTP Range requests.
    ///
    /// Requests `Range: bytes=start-end` and retries transient failures
    /// with a linear backoff before giving up.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        // Clamp the requested range to the remote size.
        let end = (offset + buf.len() as u64 - 1).min(self.size - 1);
        let expected = (end - offset + 1) as usize;

        let mut received = 0;
        let mut retries = 0;

        while received < expected {
            let range = format!("bytes={}-{end}", offset + received as u64);
            let result = self
                .client
                .get(&self.url)
                .header("Range", &range)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    if resp.status() != StatusCode::PARTIAL_CONTENT {
                        return Err(io::Error::other(format!(
                            "range request failed with status {}",
                            resp.status()
                        )));
                    }

                    let bytes = resp.bytes().await.map_err(io::Error::other)?;
                    if bytes.is_empty() {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "empty range response",
                        ));
                    }

                    let n = bytes.len().min(expected - received);
                    buf[received..received + n].copy_from_slice(&bytes[..n]);
                    received += n;
                    self.transferred_bytes
                        .fetch_add(n as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(io::Error::other(format!(
                            "giving up after {MAX_RETRIES} retries: {e}"
                        )));
                    }
                    eprintln!("connection error, retry {retries}/{MAX_RETRIES}: {e}");
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(retries))).await;
                }
                Err(e) => return Err(io::Error::other(e)),
            }
        }

        Ok(received)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
