mod http;
mod local;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;

use async_trait::async_trait;
use std::io;

/// Trait for random access reading from a data source.
///
/// Implementations must support reads at arbitrary offsets, including
/// backward movement between calls; the archive decoder seeks freely
/// between the directory region and chunk data.
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// Returns the number of bytes read. Short reads are allowed; a
    /// return of 0 means the offset is at or past the end of the source.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source.
    fn size(&self) -> u64;

    /// Fill `buf` completely from `offset`.
    ///
    /// Loops over [`read_at`](Self::read_at) and fails with
    /// [`io::ErrorKind::UnexpectedEof`] if the source runs out first.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .read_at(offset + filled as u64, &mut buf[filled..])
                .await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("read past end of source at offset {}", offset + filled as u64),
                ));
            }
            filled += n;
        }
        Ok(())
    }
}
