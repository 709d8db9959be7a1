//! Low-level HPI archive parser.
//!
//! This module reads the fixed header, materializes the enciphered
//! directory region into memory, and walks the directory tree.
//!
//! ## Parsing strategy
//!
//! HPI directories are self-referential: every offset stored in a
//! directory record, entry, or name pointer is an absolute file offset
//! into the same archive. Rather than threading a second offset space
//! through the traversal, the whole directory region is read (and
//! deciphered) once into a [`DirectoryImage`] that keeps its on-disk base
//! offset, so absolute offsets resolve directly against the image.

use std::sync::Arc;
use tracing::debug;

use crate::io::ReadAt;

use super::cipher::Cipher;
use super::error::{HpiError, Result};
use super::structures::{CompressionMethod, DirectoryRecord, Entry, FileData, Header};

/// Hard cap on directory nesting, so cyclic offsets in a hostile archive
/// cannot recurse forever.
const MAX_DEPTH: usize = 64;

/// A leaf of the archive's directory tree.
#[derive(Debug, Clone)]
pub struct HpiFileEntry {
    /// Slash-separated path relative to the archive root
    pub path: String,
    /// Absolute offset of the first chunk of file data
    pub data_offset: u32,
    /// Decompressed size in bytes
    pub file_size: u32,
    /// Storage method declared by the file record
    pub method: CompressionMethod,
}

/// The decrypted directory region, addressable by absolute file offsets.
#[derive(Debug)]
pub struct DirectoryImage {
    base: u64,
    data: Vec<u8>,
}

impl DirectoryImage {
    /// Bounds-checked view of `len` bytes at absolute offset `offset`.
    fn slice(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let end = self.base + self.data.len() as u64;
        let need = offset.checked_add(len as u64).ok_or_else(|| {
            HpiError::format("directory offset overflow")
        })?;
        if offset < self.base || need > end {
            return Err(HpiError::Format(format!(
                "offset {offset:#x}+{len} outside directory region {:#x}..{end:#x}",
                self.base
            )));
        }
        let rel = (offset - self.base) as usize;
        Ok(&self.data[rel..rel + len])
    }

    /// NUL-terminated name at absolute offset `offset`, without the NUL.
    fn name_at(&self, offset: u64) -> Result<&[u8]> {
        if offset < self.base || offset >= self.base + self.data.len() as u64 {
            return Err(HpiError::Format(format!(
                "name offset {offset:#x} outside directory region"
            )));
        }
        let rel = (offset - self.base) as usize;
        let tail = &self.data[rel..];
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| HpiError::format("unterminated name in directory"))?;
        Ok(&tail[..end])
    }

    /// Depth-first traversal from the directory record at `root`,
    /// producing every leaf in directory-index order.
    pub fn walk(&self, root: u32) -> Result<Vec<HpiFileEntry>> {
        let mut out = Vec::new();
        self.walk_dir(u64::from(root), "", 0, &mut out)?;
        Ok(out)
    }

    fn walk_dir(
        &self,
        dir_offset: u64,
        parent: &str,
        depth: usize,
        out: &mut Vec<HpiFileEntry>,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(HpiError::format("directory nesting too deep"));
        }

        let record = DirectoryRecord::from_bytes(self.slice(dir_offset, DirectoryRecord::SIZE)?)?;

        for i in 0..u64::from(record.num_entries) {
            let entry_offset = u64::from(record.entries_offset) + i * Entry::SIZE as u64;
            let entry = Entry::from_bytes(self.slice(entry_offset, Entry::SIZE)?)?;

            let name = sanitize_name(self.name_at(u64::from(entry.name_offset))?)?;
            let path = if parent.is_empty() {
                name
            } else {
                format!("{parent}/{name}")
            };

            if entry.is_directory() {
                self.walk_dir(u64::from(entry.data_offset), &path, depth + 1, out)?;
            } else {
                let file =
                    FileData::from_bytes(self.slice(u64::from(entry.data_offset), FileData::SIZE)?)?;
                out.push(HpiFileEntry {
                    path,
                    data_offset: file.data_offset,
                    file_size: file.file_size,
                    method: file.method,
                });
            }
        }

        Ok(())
    }
}

/// Decode an entry name and refuse anything that could escape the
/// extraction root.
///
/// Names are opaque bytes with no declared encoding; they are decoded
/// lossily and backslashes are normalized to `/`. Empty names, absolute
/// paths, drive-like segments, and `.`/`..` segments are rejected.
fn sanitize_name(raw: &[u8]) -> Result<String> {
    let name = String::from_utf8_lossy(raw).replace('\\', "/");

    if name.is_empty() || name.starts_with('/') {
        return Err(HpiError::Path(name));
    }
    for segment in name.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains(':') {
            return Err(HpiError::Path(name));
        }
    }

    Ok(name)
}

/// Low-level archive parser over a random-access byte source.
///
/// Typically used through [`HpiExtractor`](super::HpiExtractor) rather
/// than directly.
#[derive(Debug)]
pub struct HpiParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> HpiParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Shared handle on the underlying source, for reading chunk data
    /// once the directory has been walked.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read and validate the 20-byte header at offset 0.
    pub async fn read_header(&self) -> Result<Header> {
        let mut buf = [0u8; Header::SIZE];
        self.reader.read_exact_at(0, &mut buf).await?;
        Header::from_bytes(&buf)
    }

    /// Materialize the directory region into a decrypted in-memory image.
    ///
    /// The `directory_size` header field means different things in
    /// different archive flavors (absolute end of the region, or its
    /// length); both are tolerated by treating values past `start` as an
    /// end offset and anything else as a length, and the region is always
    /// clamped at end-of-file rather than trusted blindly.
    pub async fn read_directory(&self, header: &Header, cipher: &Cipher) -> Result<DirectoryImage> {
        let start = u64::from(header.start);
        if start < Header::SIZE as u64 || start >= self.size {
            return Err(HpiError::Format(format!(
                "directory start {start:#x} outside archive of {} bytes",
                self.size
            )));
        }

        let declared = u64::from(header.directory_size);
        let declared_end = if declared >= start {
            declared
        } else {
            start + declared
        };
        let end = declared_end.min(self.size);
        if end <= start {
            return Err(HpiError::format("empty directory region"));
        }

        let mut data = vec![0u8; (end - start) as usize];
        self.reader.read_exact_at(start, &mut data).await?;
        cipher.decrypt_in_place(start, &mut data);

        debug!(
            start,
            end,
            enciphered = cipher.is_enabled(),
            "materialized directory region"
        );

        Ok(DirectoryImage { base: start, data })
    }
}
