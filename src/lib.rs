//! # runhpi
//!
//! A decoder and extractor for HPI archives, the package format of the
//! Total Annihilation game engine (and its `BANK` save-game variant).
//!
//! An HPI archive embeds a directory tree whose leaves may be stored
//! plain, LZ77-compressed, or zlib-compressed, split into chunks of at
//! most 64 KiB, and optionally obfuscated with a position-dependent XOR
//! cipher. This library reads archives from any random-access byte
//! source; local files and HTTP servers with Range support are provided.
//!
//! ## Features
//!
//! - Extract HPI archives from the local filesystem or HTTP/HTTPS URLs
//! - Both archive flavors: standard and `BANK` saves
//! - All three chunk codecs (stored, the HPI LZ77 variant, zlib)
//! - Defensive parsing: every offset is bounds-checked, chunk checksums
//!   are verified, and hostile entry names are rejected
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use runhpi::{CancelToken, HpiExtractor, LocalFileReader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::new(Path::new("totala1.hpi"))?);
//!     let extractor = HpiExtractor::open(reader).await?;
//!
//!     for entry in extractor.entries()? {
//!         println!("{} ({} bytes)", entry.path, entry.file_size);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod hpi;
pub mod io;

pub use cli::{Cli, Command};
pub use hpi::{
    CancelToken, Cipher, CompressionMethod, Header, HpiError, HpiExtractor, HpiFileEntry,
    HpiParser, Result,
};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt};
