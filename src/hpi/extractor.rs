//! High-level HPI extraction API.
//!
//! This module glues the directory walker to the chunk engine and the
//! filesystem sink, and carries the cancellation signal that is polled
//! between chunks.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use runhpi::{CancelToken, HpiExtractor, LocalFileReader};
//!
//! # async fn example() -> runhpi::Result<()> {
//! let reader = Arc::new(LocalFileReader::new(Path::new("totala1.hpi"))?);
//! let extractor = HpiExtractor::open(reader).await?;
//! let cancel = CancelToken::new();
//!
//! for entry in extractor.entries()? {
//!     extractor
//!         .extract_to_file(&entry, Path::new("out").join(&entry.path).as_path(), &cancel)
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::io::ReadAt;

use super::chunk::{ChunkReader, chunk_count};
use super::cipher::Cipher;
use super::error::{HpiError, Result};
use super::parser::{DirectoryImage, HpiFileEntry, HpiParser};
use super::structures::Header;

/// Shared cancellation flag.
///
/// Cloned into the Ctrl-C handler by the driver and polled by the
/// extractor between leaves and between chunks. Cancellation surfaces as
/// [`HpiError::Cancelled`] and partial output is cleaned up on the way
/// out.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(HpiError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// High-level HPI archive extractor.
///
/// Opening an archive parses the header, derives the cipher, and
/// materializes the decrypted directory image once; everything afterwards
/// reads only chunk data from the underlying source.
///
/// ## Generic parameter
///
/// The extractor is generic over the reader type `R`, so it works with
/// both local files ([`LocalFileReader`](crate::LocalFileReader)) and
/// remote sources ([`HttpRangeReader`](crate::HttpRangeReader)).
#[derive(Debug)]
pub struct HpiExtractor<R: ReadAt> {
    parser: HpiParser<R>,
    header: Header,
    cipher: Cipher,
    image: DirectoryImage,
}

impl<R: ReadAt> HpiExtractor<R> {
    /// Open an archive: validate the header and decrypt the directory.
    ///
    /// # Errors
    ///
    /// Fails with [`HpiError::Magic`] when the source is not an HPI
    /// archive, or with the usual I/O and format errors when the
    /// directory region cannot be materialized.
    pub async fn open(reader: Arc<R>) -> Result<Self> {
        let parser = HpiParser::new(reader);
        let header = parser.read_header().await?;
        let cipher = Cipher::from_header_key(header.header_key);
        let image = parser.read_directory(&header, &cipher).await?;

        debug!(
            save = header.is_save(),
            enciphered = cipher.is_enabled(),
            "opened archive"
        );

        Ok(Self {
            parser,
            header,
            cipher,
            image,
        })
    }

    /// The parsed archive header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Every leaf of the archive, depth-first in directory order.
    pub fn entries(&self) -> Result<Vec<HpiFileEntry>> {
        self.image.walk(self.header.start)
    }

    /// Decode one leaf into memory.
    ///
    /// Drives the chunk engine for the leaf's computed chunk count and
    /// concatenates the decoded chunks. The aggregate is required to
    /// match the size declared by the directory exactly.
    pub async fn read_file(&self, entry: &HpiFileEntry, cancel: &CancelToken) -> Result<Vec<u8>> {
        let chunks = chunk_count(entry.file_size);
        let expected = entry.file_size as usize;

        let mut reader = ChunkReader::new(
            self.parser.reader().as_ref(),
            self.cipher,
            u64::from(entry.data_offset),
        );
        // Sizes come out of the archive, so the preallocation is capped
        // rather than trusted.
        let mut out = Vec::with_capacity(expected.min(1 << 20));

        for _ in 0..chunks {
            cancel.check()?;
            let chunk = reader.read_chunk().await?;
            out.extend_from_slice(&chunk);
            if out.len() > expected {
                return Err(HpiError::Size {
                    declared: expected as u64,
                    actual: out.len() as u64,
                });
            }
        }

        if out.len() != expected {
            return Err(HpiError::Format(format!(
                "file decoded to {} bytes, directory declares {expected}",
                out.len()
            )));
        }

        Ok(out)
    }

    /// Extract one leaf to the filesystem.
    ///
    /// Parent directories are created as needed. The leaf is decoded
    /// fully before the output file is created, and a failed or
    /// cancelled write removes the partial file.
    pub async fn extract_to_file(
        &self,
        entry: &HpiFileEntry,
        output_path: &Path,
        cancel: &CancelToken,
    ) -> Result<()> {
        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let data = self.read_file(entry, cancel).await?;

        let mut file = fs::File::create(output_path).await?;
        let written = async {
            file.write_all(&data).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(output_path).await;
            return Err(e.into());
        }

        Ok(())
    }
}
