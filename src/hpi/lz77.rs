//! Decoder for the HPI dictionary coder (chunk method 1).
//!
//! The format is a small LZ77 variant: a 4096-byte ring window primed with
//! spaces, groups of eight tokens introduced by a flag byte, and 16-bit
//! back-references whose top 12 bits address the window directly. There is
//! no length-delimited end; a back-reference with window offset 0
//! terminates the stream.

use super::error::{HpiError, Result};

const WINDOW_SIZE: usize = 4096;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;
const WINDOW_FILL: u8 = 0x20;

/// Decode one chunk payload, producing at most `declared_size` bytes.
///
/// Tokens are consumed from a flag byte's low bits upward: a set bit means
/// the next input byte is a literal, a clear bit means the next two bytes
/// are a little-endian back-reference word. The window write cursor starts
/// at index 1 so that offset 0 stays free as the terminator.
///
/// # Errors
///
/// [`HpiError::Compression`] if the input runs out before the terminator,
/// [`HpiError::Size`] if the stream tries to emit more than
/// `declared_size` bytes.
pub fn decompress(input: &[u8], declared_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(declared_size);
    let mut window = [WINDOW_FILL; WINDOW_SIZE];
    let mut wpos: usize = 1;
    let mut pos: usize = 0;

    fn emit(
        out: &mut Vec<u8>,
        window: &mut [u8; WINDOW_SIZE],
        wpos: &mut usize,
        byte: u8,
        declared_size: usize,
    ) -> Result<()> {
        if out.len() >= declared_size {
            return Err(HpiError::Size {
                declared: declared_size as u64,
                actual: out.len() as u64 + 1,
            });
        }
        out.push(byte);
        window[*wpos] = byte;
        *wpos = (*wpos + 1) & WINDOW_MASK;
        Ok(())
    }

    loop {
        let Some(&flags) = input.get(pos) else {
            return Err(HpiError::Compression(
                "lz77 stream ended without terminator".into(),
            ));
        };
        pos += 1;

        for bit in 0..8 {
            if flags & (1 << bit) != 0 {
                let Some(&byte) = input.get(pos) else {
                    return Err(HpiError::Compression(
                        "lz77 stream truncated inside literal".into(),
                    ));
                };
                pos += 1;
                emit(&mut out, &mut window, &mut wpos, byte, declared_size)?;
            } else {
                if pos + 2 > input.len() {
                    return Err(HpiError::Compression(
                        "lz77 stream truncated inside back-reference".into(),
                    ));
                }
                let word = u16::from_le_bytes([input[pos], input[pos + 1]]);
                pos += 2;

                let offset = (word >> 4) as usize;
                if offset == 0 {
                    return Ok(out);
                }
                let length = (word & 0xF) as usize + 2;

                // Reads and writes advance in lockstep so a reference may
                // overlap the bytes it is producing.
                let mut src = offset;
                for _ in 0..length {
                    let byte = window[src & WINDOW_MASK];
                    src += 1;
                    emit(&mut out, &mut window, &mut wpos, byte, declared_size)?;
                }
            }
        }
    }
}
