//! COBS framing and padded CRC32 for the hub wire protocol.
//!
//! Every message travels as one frame:
//! - the payload is byte-stuffed so no byte `<= 0x02` remains
//! - every stuffed byte is XORed with `0x03`
//! - the frame is terminated by the delimiter `0x02`
//!
//! Inbound frames may be prefixed by a priority byte `0x01` and may arrive
//! split across any number of transport packets. Outbound frames are split
//! into packets no larger than the negotiated packet size.

#[cfg(feature = "async")]
pub mod async_io;
pub mod cobs;
pub mod codec;
pub mod crc;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_io::{write_frame_async, FrameCodec};
pub use cobs::{pack, unpack, DELIMITER, MAX_BLOCK_SIZE, PRIORITY_BYTE, XOR_MASK};
pub use codec::{decode_frame, encode_frame, packetize, FrameConfig, DEFAULT_MAX_FRAME_SIZE};
pub use crc::{crc, crc_seeded, crc_with, DEFAULT_ALIGN};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
