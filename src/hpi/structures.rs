use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use super::error::{HpiError, Result};

/// Archive magic at offset 0
pub const HPI_MAGIC: &[u8; 4] = b"HAPI";

/// Second marker value used by save-game archives
pub const BANK_MARKER: &[u8; 4] = b"BANK";

/// Marker introducing each data chunk
pub const SQSH_MARKER: &[u8; 4] = b"SQSH";

/// Maximum decompressed payload of a single chunk
pub const CHUNK_SIZE: u32 = 65536;

/// How a file's chunks are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Lz77,
    Zlib,
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionMethod::Stored),
            1 => Some(CompressionMethod::Lz77),
            2 => Some(CompressionMethod::Zlib),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionMethod::Stored => "stored",
            CompressionMethod::Lz77 => "lz77",
            CompressionMethod::Zlib => "zlib",
        }
    }
}

/// Archive header - fixed 20 bytes at offset 0, little-endian
#[derive(Debug, Clone)]
pub struct Header {
    /// `BANK` for save archives, a version word otherwise
    pub save_marker: [u8; 4],
    /// End (or length, depending on flavor) of the directory region
    pub directory_size: u32,
    /// Raw cipher key; 0 disables encryption everywhere
    pub header_key: u32,
    /// Absolute offset of the root directory record
    pub start: u32,
}

impl Header {
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(HpiError::format("short read on archive header"));
        }

        if &data[0..4] != HPI_MAGIC {
            return Err(HpiError::Magic {
                found: [data[0], data[1], data[2], data[3]],
            });
        }

        let mut save_marker = [0u8; 4];
        save_marker.copy_from_slice(&data[4..8]);

        let mut cursor = Cursor::new(&data[8..]);

        Ok(Self {
            save_marker,
            directory_size: cursor.read_u32::<LittleEndian>()?,
            header_key: cursor.read_u32::<LittleEndian>()?,
            start: cursor.read_u32::<LittleEndian>()?,
        })
    }

    pub fn is_save(&self) -> bool {
        &self.save_marker == BANK_MARKER
    }
}

/// Directory record - 8 bytes: entry count plus offset of the entry array
#[derive(Debug, Clone, Copy)]
pub struct DirectoryRecord {
    pub num_entries: u32,
    pub entries_offset: u32,
}

impl DirectoryRecord {
    pub const SIZE: usize = 8;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(HpiError::format("short read on directory record"));
        }

        let mut cursor = Cursor::new(data);

        Ok(Self {
            num_entries: cursor.read_u32::<LittleEndian>()?,
            entries_offset: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// Directory entry - 9 packed bytes, no padding
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub name_offset: u32,
    pub data_offset: u32,
    pub flag: u8,
}

impl Entry {
    pub const SIZE: usize = 9;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(HpiError::format("short read on directory entry"));
        }

        let mut cursor = Cursor::new(data);

        Ok(Self {
            name_offset: cursor.read_u32::<LittleEndian>()?,
            data_offset: cursor.read_u32::<LittleEndian>()?,
            flag: cursor.read_u8()?,
        })
    }

    /// `flag == 1` marks a subdirectory; anything else is a file
    pub fn is_directory(&self) -> bool {
        self.flag == 1
    }
}

/// File record - 9 packed bytes pointed to by a non-directory entry
#[derive(Debug, Clone, Copy)]
pub struct FileData {
    /// Absolute offset of the first chunk
    pub data_offset: u32,
    /// Decompressed size of the whole file
    pub file_size: u32,
    pub method: CompressionMethod,
}

impl FileData {
    pub const SIZE: usize = 9;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(HpiError::format("short read on file record"));
        }

        let mut cursor = Cursor::new(data);
        let data_offset = cursor.read_u32::<LittleEndian>()?;
        let file_size = cursor.read_u32::<LittleEndian>()?;
        let flag = cursor.read_u8()?;

        let method = CompressionMethod::from_u8(flag).ok_or(HpiError::Unsupported(flag))?;

        Ok(Self {
            data_offset,
            file_size,
            method,
        })
    }
}

/// Fixed chunk preamble following the `SQSH` marker
#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    pub unknown1: u8,
    /// 1 = LZ77, 2 = zlib; 0 appears in synthetic archives for stored chunks
    pub comp_method: u8,
    pub encrypt: bool,
    pub compressed_size: u32,
    pub decompressed_size: u32,
    /// Wrapping u32 sum of the stored payload bytes
    pub checksum: u32,
}

impl ChunkHeader {
    /// Preamble length after the marker
    pub const SIZE: usize = 15;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(HpiError::format("short read on chunk preamble"));
        }

        let mut cursor = Cursor::new(data);
        let unknown1 = cursor.read_u8()?;
        let comp_method = cursor.read_u8()?;
        let encrypt = match cursor.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(HpiError::Format(format!(
                    "invalid chunk encrypt flag {other}"
                )));
            }
        };

        Ok(Self {
            unknown1,
            comp_method,
            encrypt,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            decompressed_size: cursor.read_u32::<LittleEndian>()?,
            checksum: cursor.read_u32::<LittleEndian>()?,
        })
    }
}
