use thiserror::Error;

/// Result type for HPI operations
pub type Result<T> = std::result::Result<T, HpiError>;

/// Everything that can go wrong while decoding an HPI archive.
///
/// The variants map one-to-one onto the failure classes the decoder
/// distinguishes: transport errors, structural violations, and the
/// per-chunk integrity checks.
#[derive(Debug, Error)]
pub enum HpiError {
    /// Read or seek failure on the byte source, or a write failure on the sink
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive does not start with the `HAPI` marker
    #[error("not an HPI archive: expected magic \"HAPI\", found {found:?}")]
    Magic { found: [u8; 4] },

    /// Structural violation: oversized offset, impossible size, malformed preamble
    #[error("malformed archive: {0}")]
    Format(String),

    /// A chunk payload did not sum to its declared checksum
    #[error("chunk checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Checksum { stored: u32, computed: u32 },

    /// A compressed stream was rejected by the decoder
    #[error("decompression failed: {0}")]
    Compression(String),

    /// Decoded output exceeds the declared size
    #[error("decompressed output too large: {actual} bytes, declared {declared}")]
    Size { declared: u64, actual: u64 },

    /// A compression method outside {0, 1, 2}
    #[error("unsupported compression method {0}")]
    Unsupported(u8),

    /// An entry name that would escape the output directory
    #[error("unsafe entry name: {0:?}")]
    Path(String),

    /// Extraction was cancelled between chunks or between leaves
    #[error("extraction cancelled")]
    Cancelled,
}

impl HpiError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        HpiError::Format(msg.into())
    }
}
