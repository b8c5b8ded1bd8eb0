//! Padded, seedable CRC32.
//!
//! The hub checksums file contents in 4-byte words, so the input is padded
//! with zero bytes up to the alignment before the standard CRC32 is applied.
//! Seeding with a previous result continues that checksum, which is how the
//! running CRC of a chunked upload is built.

use crc32fast::Hasher;

/// Alignment used by the hub for all file checksums.
pub const DEFAULT_ALIGN: usize = 4;

const ZERO_PAD: [u8; 16] = [0; 16];

/// CRC32 of `data` padded to [`DEFAULT_ALIGN`], starting from seed 0.
pub fn crc(data: &[u8]) -> u32 {
    crc_with(data, 0, DEFAULT_ALIGN)
}

/// CRC32 of `data` padded to [`DEFAULT_ALIGN`], continuing from `seed`.
///
/// `crc_seeded(b, crc(a)) == crc(a ++ b)` whenever `a.len()` is a multiple of
/// the alignment.
pub fn crc_seeded(data: &[u8], seed: u32) -> u32 {
    crc_with(data, seed, DEFAULT_ALIGN)
}

/// CRC32 of `data` padded with zeros to a multiple of `align`, continuing from `seed`.
///
/// An `align` of 0 is treated as 1 (no padding).
pub fn crc_with(data: &[u8], seed: u32, align: usize) -> u32 {
    let mut hasher = Hasher::new_with_initial(seed);
    hasher.update(data);

    let align = align.max(1);
    let mut pad = (align - data.len() % align) % align;
    while pad > 0 {
        let n = pad.min(ZERO_PAD.len());
        hasher.update(&ZERO_PAD[..n]);
        pad -= n;
    }

    hasher.finalize()
}
