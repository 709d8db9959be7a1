//! Per-chunk framing: locate the `SQSH` marker, validate the payload
//! checksum, decipher, and dispatch to the right decoder.
//!
//! File data is split into chunks of at most 65536 decompressed bytes.
//! Each chunk is introduced by a 4-byte size word followed by the marker;
//! the size word is redundant and some tools omit it, so the reader
//! accepts a chunk that starts directly at the marker. Anything needing
//! more than one 4-byte skip to reach a marker is treated as corruption.

use flate2::read::ZlibDecoder;
use std::io::Read;
use tracing::trace;

use crate::io::ReadAt;

use super::cipher::Cipher;
use super::error::{HpiError, Result};
use super::lz77;
use super::structures::{CHUNK_SIZE, ChunkHeader, CompressionMethod, SQSH_MARKER};

/// Number of chunks a leaf of `file_size` decompressed bytes occupies.
///
/// One chunk per started 65536-byte block, plus a trailing empty-output
/// chunk whenever the size is an exact multiple (a zero-byte file is a
/// single empty chunk).
pub fn chunk_count(file_size: u32) -> u32 {
    let mut chunks = file_size.div_ceil(CHUNK_SIZE);
    if file_size % CHUNK_SIZE == 0 {
        chunks += 1;
    }
    chunks
}

/// Sequential chunk decoder for one file's data region.
///
/// Owns the cursor between chunks; chunks must be consumed in file order
/// because each one starts where the previous payload ended.
pub struct ChunkReader<'a, R: ReadAt + ?Sized> {
    source: &'a R,
    cipher: Cipher,
    pos: u64,
}

impl<'a, R: ReadAt + ?Sized> ChunkReader<'a, R> {
    pub fn new(source: &'a R, cipher: Cipher, start: u64) -> Self {
        Self {
            source,
            cipher,
            pos: start,
        }
    }

    /// Current absolute cursor, for error context.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Decode the chunk at the cursor and advance past it.
    pub async fn read_chunk(&mut self) -> Result<Vec<u8>> {
        let marker_pos = self.find_marker().await?;

        let mut preamble = [0u8; ChunkHeader::SIZE];
        self.source.read_exact_at(self.pos, &mut preamble).await?;
        self.pos += ChunkHeader::SIZE as u64;
        let header = ChunkHeader::from_bytes(&preamble)?;

        if header.decompressed_size > CHUNK_SIZE {
            return Err(HpiError::Format(format!(
                "chunk at {marker_pos:#x} declares {} decompressed bytes (limit {CHUNK_SIZE})",
                header.decompressed_size
            )));
        }

        let payload_offset = self.pos;
        if payload_offset + u64::from(header.compressed_size) > self.source.size() {
            return Err(HpiError::Format(format!(
                "chunk payload at {payload_offset:#x} extends past end of archive"
            )));
        }

        let mut payload = vec![0u8; header.compressed_size as usize];
        self.source.read_exact_at(payload_offset, &mut payload).await?;
        self.pos += u64::from(header.compressed_size);

        // The checksum covers the payload as stored, before deciphering.
        let computed = payload
            .iter()
            .fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)));
        if computed != header.checksum {
            return Err(HpiError::Checksum {
                stored: header.checksum,
                computed,
            });
        }

        if header.encrypt {
            self.cipher.decrypt_in_place(payload_offset, &mut payload);
        }

        let declared = header.decompressed_size as usize;
        let out = match CompressionMethod::from_u8(header.comp_method) {
            Some(CompressionMethod::Stored) => {
                if payload.len() > declared {
                    return Err(HpiError::Size {
                        declared: declared as u64,
                        actual: payload.len() as u64,
                    });
                }
                payload
            }
            Some(CompressionMethod::Lz77) => lz77::decompress(&payload, declared)?,
            Some(CompressionMethod::Zlib) => inflate(&payload, declared)?,
            None => return Err(HpiError::Unsupported(header.comp_method)),
        };

        trace!(
            method = header.comp_method,
            compressed = header.compressed_size,
            decompressed = out.len(),
            offset = marker_pos,
            "decoded chunk"
        );

        Ok(out)
    }

    /// Advance the cursor to just past the next `SQSH` marker.
    ///
    /// Accepts the marker either immediately or after a single 4-byte
    /// size word; more skipping than that means the archive is damaged.
    async fn find_marker(&mut self) -> Result<u64> {
        let mut word = [0u8; 4];
        let mut skipped = 0u32;

        loop {
            let word_pos = self.pos;
            self.source.read_exact_at(word_pos, &mut word).await?;
            self.pos += 4;

            if &word == SQSH_MARKER {
                if skipped > 0 {
                    trace!(skipped, offset = word_pos, "skipped chunk size word");
                }
                return Ok(word_pos);
            }

            skipped += 4;
            if skipped > 4 {
                return Err(HpiError::Format(format!(
                    "no chunk marker near {word_pos:#x}"
                )));
            }
        }
    }
}

/// Inflate a zlib-framed payload, refusing to emit more than
/// `declared_size` bytes.
fn inflate(payload: &[u8], declared_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(declared_size);
    let mut decoder = ZlibDecoder::new(payload).take(declared_size as u64 + 1);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| HpiError::Compression(format!("zlib: {e}")))?;

    if out.len() > declared_size {
        return Err(HpiError::Size {
            declared: declared_size as u64,
            actual: out.len() as u64,
        });
    }
    Ok(out)
}
