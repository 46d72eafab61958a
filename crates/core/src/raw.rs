//! Low-level little-endian readers shared by the binary decoders.
//!
//! All simulation outputs are streams of little-endian 32-bit words with
//! no alignment padding, so a `BufReader` plus `from_le_bytes` covers
//! every format in the crate.

use std::io::Read;
use std::path::Path;

use crate::error::{PostError, Result};

/// Read one `i32` word.
pub(crate) fn read_i32(reader: &mut impl Read, path: &Path) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|e| PostError::io(path, e))?;
    Ok(i32::from_le_bytes(buf))
}

/// Read `count` consecutive `i32` words.
pub(crate) fn read_i32_vec(reader: &mut impl Read, count: usize, path: &Path) -> Result<Vec<i32>> {
    let mut bytes = vec![0u8; count * 4];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| PostError::io(path, e))?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Read `count` consecutive `f32` words.
pub(crate) fn read_f32_vec(reader: &mut impl Read, count: usize, path: &Path) -> Result<Vec<f32>> {
    let mut bytes = vec![0u8; count * 4];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| PostError::io(path, e))?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Skip `words` 32-bit words.
pub(crate) fn skip_words(reader: &mut impl Read, words: usize, path: &Path) -> Result<()> {
    let mut remaining = words as u64 * 4;
    let mut scratch = [0u8; 4096];
    while remaining > 0 {
        let take = remaining.min(scratch.len() as u64) as usize;
        reader
            .read_exact(&mut scratch[..take])
            .map_err(|e| PostError::io(path, e))?;
        remaining -= take as u64;
    }
    Ok(())
}
