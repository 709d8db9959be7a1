mod chunk;
mod cipher;
mod error;
mod extractor;
mod lz77;
mod parser;
mod structures;

pub use chunk::{ChunkReader, chunk_count};
pub use cipher::Cipher;
pub use error::{HpiError, Result};
pub use extractor::{CancelToken, HpiExtractor};
pub use lz77::decompress as decompress_lz77;
pub use parser::{DirectoryImage, HpiFileEntry, HpiParser};
pub use structures::*;
