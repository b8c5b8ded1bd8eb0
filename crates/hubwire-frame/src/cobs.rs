//! Consistent Overhead Byte Stuffing with the hub's delimiter and XOR mask.
//!
//! Unlike textbook COBS, which removes only 0x00, this variant removes every
//! byte value `<= DELIMITER` (0x00, 0x01 and 0x02). A code word records the
//! block length and which of those low values terminated the block:
//!
//! ```text
//! code = value * MAX_BLOCK_SIZE + block_len + CODE_OFFSET
//! ```
//!
//! `block_len` counts the code word itself, so a block carries at most
//! `MAX_BLOCK_SIZE` data bytes. A full block with no terminating low value
//! keeps the placeholder code [`NO_DELIMITER`].
//!
//! On the wire every stuffed byte is XORed with [`XOR_MASK`] and the frame is
//! terminated by the literal [`DELIMITER`]. The mask maps stuffed bytes (all
//! `>= 0x03`) away from 0x01 and 0x02, so the delimiter and the priority byte
//! are unambiguous.

use crate::error::{FrameError, Result};

/// End-of-frame marker. Also the largest value removed by stuffing.
pub const DELIMITER: u8 = 0x02;

/// Code word of a full block that was not terminated by a low value.
pub const NO_DELIMITER: u8 = 0xFF;

/// Offset added to every code word.
pub const CODE_OFFSET: u8 = DELIMITER;

/// Maximum number of data bytes in one block.
pub const MAX_BLOCK_SIZE: usize = 84;

/// Mask applied to stuffed bytes on the wire.
pub const XOR_MASK: u8 = 3;

/// Optional leading byte of an inbound frame. Carries no information.
pub const PRIORITY_BYTE: u8 = 0x01;

/// Upper bound on the stuffed length of `len` input bytes.
pub const fn max_encoded_len(len: usize) -> usize {
    len + len / MAX_BLOCK_SIZE + 1
}

/// Stuff `data` so that no byte `<= DELIMITER` remains.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(max_encoded_len(data.len()));
    let mut code_index = buf.len();
    buf.push(NO_DELIMITER);
    // Bytes in the current block, code word included.
    let mut block = 1usize;

    for &byte in data {
        if byte > DELIMITER {
            buf.push(byte);
            block += 1;
        }

        if byte <= DELIMITER || block > MAX_BLOCK_SIZE {
            if byte <= DELIMITER {
                // block <= MAX_BLOCK_SIZE here, so the code fits in 0x03..=0xFE.
                buf[code_index] = code_word(byte, block);
            }
            code_index = buf.len();
            buf.push(NO_DELIMITER);
            block = 1;
        }
    }

    buf[code_index] = code_word(0, block);
    buf
}

/// Reverse [`encode`].
///
/// Fails on an empty input, on any byte `<= DELIMITER`, and when the input
/// ends in the middle of a block.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let (&first, rest) = data.split_first().ok_or(FrameError::EmptyFrame)?;
    let mut out = Vec::with_capacity(data.len());
    let (mut value, mut block) = unescape(first, 0)?;

    for (i, &byte) in rest.iter().enumerate() {
        let offset = i + 1;
        block -= 1;
        if block > 0 {
            if byte <= DELIMITER {
                return Err(FrameError::UnexpectedByte { offset, byte });
            }
            out.push(byte);
            continue;
        }

        if let Some(value) = value {
            out.push(value);
        }
        (value, block) = unescape(byte, offset)?;
    }

    // The final block's value is implied by the end of the frame and never emitted.
    if block != 1 {
        return Err(FrameError::TruncatedBlock { missing: block - 1 });
    }

    Ok(out)
}

/// Stuff, mask and terminate `data` for the wire.
pub fn pack(data: &[u8]) -> Vec<u8> {
    let mut buf = encode(data);
    for byte in &mut buf {
        *byte ^= XOR_MASK;
    }
    buf.push(DELIMITER);
    buf
}

/// Reverse [`pack`] for one complete frame, skipping an optional priority byte.
pub fn unpack(frame: &[u8]) -> Result<Vec<u8>> {
    let body = match frame.split_last() {
        Some((&DELIMITER, body)) => body,
        _ => return Err(FrameError::Unterminated),
    };
    let body = match body.split_first() {
        Some((&PRIORITY_BYTE, rest)) => rest,
        _ => body,
    };

    let unmasked: Vec<u8> = body.iter().map(|byte| byte ^ XOR_MASK).collect();
    decode(&unmasked)
}

fn code_word(value: u8, block: usize) -> u8 {
    (usize::from(value) * MAX_BLOCK_SIZE + block + usize::from(CODE_OFFSET)) as u8
}

/// Split a code word into the low value it stands for and the block length
/// (code word included).
fn unescape(code: u8, offset: usize) -> Result<(Option<u8>, usize)> {
    if code == NO_DELIMITER {
        return Ok((None, MAX_BLOCK_SIZE + 1));
    }
    if code <= CODE_OFFSET {
        return Err(FrameError::UnexpectedByte { offset, byte: code });
    }

    let adjusted = usize::from(code - CODE_OFFSET);
    let mut value = adjusted / MAX_BLOCK_SIZE;
    let mut block = adjusted % MAX_BLOCK_SIZE;
    if block == 0 {
        // A full block terminated by a low value.
        block = MAX_BLOCK_SIZE;
        value -= 1;
    }

    Ok((Some(value as u8), block))
}
