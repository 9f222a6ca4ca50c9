//! 32-bit Murmur3 hash used to derive file identifiers from paths.

use crate::config::PATH_SEED;

#[inline]
fn scramble(mut k: u32) -> u32 {
    k = k.wrapping_mul(0xcc9e_2d51);
    k = k.rotate_left(15);
    k.wrapping_mul(0x1b87_3593)
}

pub fn murmur3_32(key: &[u8], seed: u32) -> u32 {
    let mut h = seed;

    let mut words = key.chunks_exact(4);
    for word in &mut words {
        let k = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        h ^= scramble(k);
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let k = words
        .remainder()
        .iter()
        .rev()
        .fold(0u32, |k, &byte| (k << 8) | byte as u32);
    h ^= scramble(k);

    h ^= key.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Identifier stored in the ID table for the file at `path`.
pub fn path_hash(path: impl AsRef<[u8]>) -> u32 {
    murmur3_32(path.as_ref(), PATH_SEED)
}

/// Wrapping sum of `bytes`.
pub fn byte_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}
