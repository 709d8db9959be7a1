//! Synthetic HPI archive builder shared by the integration tests.
//!
//! Lays out a real directory region (records, entries, names, file
//! records) followed by chunked file data, with optional directory and
//! payload enciphering, so the decoder is exercised against byte-exact
//! archives without fixture files.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

use runhpi::Cipher;

pub const HEADER_SIZE: usize = 20;
pub const CHUNK_SIZE: usize = 65536;

/// Version word carried by non-save archives.
const ARCHIVE_MARKER: [u8; 4] = [0x00, 0x00, 0x01, 0x00];

struct FileSpec {
    path: String,
    content: Vec<u8>,
    method: u8,
    encrypt: bool,
}

enum Node {
    Dir(Vec<(String, Node)>),
    File(usize),
}

pub struct ArchiveBuilder {
    header_key: u32,
    save: bool,
    directory_size: Option<u32>,
    files: Vec<FileSpec>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            header_key: 0,
            save: false,
            directory_size: None,
            files: Vec::new(),
        }
    }

    pub fn key(mut self, header_key: u32) -> Self {
        self.header_key = header_key;
        self
    }

    pub fn save(mut self) -> Self {
        self.save = true;
        self
    }

    /// Override the header's directory-size field, e.g. to emulate the
    /// flavor that stores the region length instead of its end offset.
    pub fn directory_size(mut self, value: u32) -> Self {
        self.directory_size = Some(value);
        self
    }

    pub fn file(self, path: &str, content: &[u8], method: u8) -> Self {
        self.add(path, content, method, false)
    }

    pub fn encrypted_file(self, path: &str, content: &[u8], method: u8) -> Self {
        self.add(path, content, method, true)
    }

    fn add(mut self, path: &str, content: &[u8], method: u8, encrypt: bool) -> Self {
        self.files.push(FileSpec {
            path: path.to_string(),
            content: content.to_vec(),
            method,
            encrypt,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        // Fold the flat path list into a directory tree, preserving
        // insertion order.
        let mut root: Vec<(String, Node)> = Vec::new();
        for (idx, file) in self.files.iter().enumerate() {
            let components: Vec<&str> = file.path.split('/').collect();
            insert(&mut root, &components, idx);
        }

        let mut region = Vec::new();
        let mut record_slots: Vec<(usize, usize)> = Vec::new();
        layout_dir(&mut region, &root, &mut record_slots);
        let dir_end = HEADER_SIZE + region.len();

        let cipher = Cipher::from_header_key(self.header_key);

        let mut data = Vec::new();
        let mut file_offsets = vec![0u32; self.files.len()];
        for (idx, file) in self.files.iter().enumerate() {
            file_offsets[idx] = (dir_end + data.len()) as u32;
            append_chunks(&mut data, dir_end, file, &cipher);
        }

        // File records could not be filled in before the data section
        // was laid out.
        for &(pos, idx) in &record_slots {
            let file = &self.files[idx];
            region[pos..pos + 4].copy_from_slice(&file_offsets[idx].to_le_bytes());
            region[pos + 4..pos + 8]
                .copy_from_slice(&(file.content.len() as u32).to_le_bytes());
            region[pos + 8] = file.method;
        }

        cipher.encrypt_in_place(HEADER_SIZE as u64, &mut region);

        let directory_size = self.directory_size.unwrap_or(dir_end as u32);

        let mut out = Vec::new();
        out.extend_from_slice(b"HAPI");
        out.extend_from_slice(if self.save { b"BANK" } else { &ARCHIVE_MARKER });
        out.extend_from_slice(&directory_size.to_le_bytes());
        out.extend_from_slice(&self.header_key.to_le_bytes());
        out.extend_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
        out.extend_from_slice(&region);
        out.extend_from_slice(&data);
        out
    }
}

fn insert(dir: &mut Vec<(String, Node)>, components: &[&str], idx: usize) {
    if components.len() == 1 {
        dir.push((components[0].to_string(), Node::File(idx)));
        return;
    }
    for (name, node) in dir.iter_mut() {
        if name == components[0]
            && let Node::Dir(sub) = node
        {
            insert(sub, &components[1..], idx);
            return;
        }
    }
    let mut sub = Vec::new();
    insert(&mut sub, &components[1..], idx);
    dir.push((components[0].to_string(), Node::Dir(sub)));
}

/// Serialize one directory: record, entry array, then names and child
/// records. Returns the absolute offset of the directory record.
fn layout_dir(
    region: &mut Vec<u8>,
    entries: &[(String, Node)],
    record_slots: &mut Vec<(usize, usize)>,
) -> u32 {
    let rec_pos = region.len();
    region.extend_from_slice(&[0u8; 8]);
    let entries_pos = region.len();
    region.resize(entries_pos + entries.len() * 9, 0);

    let entries_abs = (HEADER_SIZE + entries_pos) as u32;
    region[rec_pos..rec_pos + 4].copy_from_slice(&(entries.len() as u32).to_le_bytes());
    region[rec_pos + 4..rec_pos + 8].copy_from_slice(&entries_abs.to_le_bytes());

    for (i, (name, node)) in entries.iter().enumerate() {
        let name_abs = (HEADER_SIZE + region.len()) as u32;
        region.extend_from_slice(name.as_bytes());
        region.push(0);

        let (data_abs, flag) = match node {
            Node::File(idx) => {
                let fd_pos = region.len();
                region.extend_from_slice(&[0u8; 9]);
                record_slots.push((fd_pos, *idx));
                ((HEADER_SIZE + fd_pos) as u32, 0u8)
            }
            Node::Dir(sub) => (layout_dir(region, sub, record_slots), 1u8),
        };

        let slot = entries_pos + i * 9;
        region[slot..slot + 4].copy_from_slice(&name_abs.to_le_bytes());
        region[slot + 4..slot + 8].copy_from_slice(&data_abs.to_le_bytes());
        region[slot + 8] = flag;
    }

    (HEADER_SIZE + rec_pos) as u32
}

fn append_chunks(data: &mut Vec<u8>, dir_end: usize, file: &FileSpec, cipher: &Cipher) {
    let mut pieces: Vec<&[u8]> = file.content.chunks(CHUNK_SIZE).collect();
    // An exact multiple of the chunk size (a zero-byte file included)
    // carries one extra chunk that decompresses to nothing.
    if file.content.len() % CHUNK_SIZE == 0 {
        pieces.push(&[]);
    }

    for piece in pieces {
        let mut payload = match file.method {
            1 => lz77_encode(piece),
            2 => zlib_encode(piece),
            _ => piece.to_vec(),
        };

        // size word + marker + preamble precede the payload
        let payload_abs = (dir_end + data.len() + 4 + 4 + 15) as u64;
        if file.encrypt {
            cipher.encrypt_in_place(payload_abs, &mut payload);
        }

        let checksum = payload
            .iter()
            .fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)));
        let total = (4 + 15 + payload.len()) as u32;

        data.extend_from_slice(&total.to_le_bytes());
        data.extend_from_slice(b"SQSH");
        data.push(0x02);
        data.push(file.method);
        data.push(u8::from(file.encrypt));
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&(piece.len() as u32).to_le_bytes());
        data.extend_from_slice(&checksum.to_le_bytes());
        data.extend_from_slice(&payload);
    }
}

/// Literal-only encoding for the HPI LZ77 variant: every token is a
/// literal, closed by a zero-offset back-reference.
fn lz77_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let group = &data[i..(i + 8).min(data.len())];
        if group.len() == 8 {
            out.push(0xFF);
            out.extend_from_slice(group);
        } else {
            out.push(((1u16 << group.len()) - 1) as u8);
            out.extend_from_slice(group);
            out.extend_from_slice(&[0, 0]);
        }
        i += group.len();
    }
    if data.len() % 8 == 0 {
        out.push(0x00);
        out.extend_from_slice(&[0, 0]);
    }
    out
}

fn zlib_encode(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
