use bytes::{BufMut, Bytes, BytesMut};

use crate::cobs::{pack, unpack, DELIMITER};
use crate::error::{FrameError, Result};

/// Default maximum wire size of one frame: 64 KiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encode a payload into one wire frame.
///
/// Wire format:
/// ```text
/// ┌────────────────────┬───────────┐
/// │ Stuffed payload    │ Delimiter │
/// │ (XOR 0x03)         │ 0x02      │
/// └────────────────────┴───────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    let frame = pack(payload);
    dst.reserve(frame.len());
    dst.put_slice(&frame);
}

/// Decode one frame from a reassembly buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a delimiter yet; the bytes
/// stay buffered for the next transport delivery. When a delimiter is found
/// the frame is consumed from the buffer before it is unpacked, so a malformed
/// frame is reported once and does not affect the frames after it.
///
/// A buffer that grows past `max_frame_size` without a delimiter is discarded.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Bytes>> {
    let Some(end) = src.iter().position(|&byte| byte == DELIMITER) else {
        if src.len() > max_frame_size {
            let size = src.len();
            src.clear();
            return Err(FrameError::FrameTooLarge {
                size,
                max: max_frame_size,
            });
        }
        return Ok(None); // Need more data
    };

    let wire = src.split_to(end + 1);
    if wire.len() > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: wire.len(),
            max: max_frame_size,
        });
    }

    let payload = unpack(&wire)?;
    tracing::trace!(
        wire_len = wire.len(),
        payload_len = payload.len(),
        "frame decoded"
    );
    Ok(Some(Bytes::from(payload)))
}

/// Split a wire frame into transport packets.
///
/// With no packet size (or a size of 0) the whole frame is one packet, which
/// is what the transport is assumed to accept before sizes are negotiated.
pub fn packetize(frame: &[u8], max_packet_size: Option<usize>) -> impl Iterator<Item = &[u8]> {
    let size = match max_packet_size {
        Some(size) if size > 0 => size,
        _ => frame.len().max(1),
    };
    frame.chunks(size)
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum wire size of one frame in bytes. Default: 64 KiB.
    pub max_frame_size: usize,
    /// Largest packet the transport accepts. `None` until negotiated.
    pub max_packet_size: Option<usize>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_packet_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cobs::PRIORITY_BYTE;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"\x21hello, hub!\x00";

        encode_frame(payload, &mut buf);
        assert_eq!(buf.last(), Some(&DELIMITER));

        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();

        assert_eq!(frame.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_frame_stays_buffered() {
        let mut wire = BytesMut::new();
        encode_frame(b"\x01fragmented", &mut wire);
        let (first, second) = wire.split_at(5);

        let mut buf = BytesMut::from(first);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(second);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(frame.as_ref(), b"\x01fragmented");
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf);
        encode_frame(b"second", &mut buf);

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(f1.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(f2.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_priority_byte_prefix() {
        let mut buf = BytesMut::from(&[PRIORITY_BYTE][..]);
        encode_frame(b"\x20\x00", &mut buf);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(frame.as_ref(), b"\x20\x00");
    }

    #[test]
    fn test_malformed_frame_is_consumed() {
        let mut buf = BytesMut::new();
        // Unmasks to 0x00, which is never a valid code word.
        buf.put_slice(&[0x03, DELIMITER]);
        encode_frame(b"next", &mut buf);

        let err = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedByte { .. }));

        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(frame.as_ref(), b"next");
    }

    #[test]
    fn test_oversized_buffer_without_delimiter_is_dropped() {
        let mut buf = BytesMut::from(&[0x44u8; 32][..]);
        let err = decode_frame(&mut buf, 16).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 32, max: 16 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_complete_frame_is_rejected() {
        let mut buf = BytesMut::new();
        encode_frame(&[0x44; 20], &mut buf);
        let err = decode_frame(&mut buf, 16).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_packetize() {
        let frame = [1u8, 2, 3, 4, 5, 6, 7];
        let packets: Vec<&[u8]> = packetize(&frame, Some(3)).collect();
        assert_eq!(packets, vec![&[1, 2, 3][..], &[4, 5, 6][..], &[7][..]]);

        let packets: Vec<&[u8]> = packetize(&frame, None).collect();
        assert_eq!(packets, vec![&frame[..]]);

        let packets: Vec<&[u8]> = packetize(&frame, Some(0)).collect();
        assert_eq!(packets.len(), 1);
    }
}
