//! Tokio integration (requires the `async` feature).

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::cobs::pack;
use crate::codec::{decode_frame, encode_frame, packetize, DEFAULT_MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};

/// `tokio_util` codec yielding unpacked frame payloads.
///
/// Malformed frames surface as errors from the stream; like
/// [`FrameReader`](crate::FrameReader), the offending bytes are already
/// consumed, so a caller using `FramedRead` directly should treat
/// [`FrameError::is_recoverable`] errors as per-frame faults.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        decode_frame(src, self.max_frame_size)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        encode_frame(&payload, dst);
        Ok(())
    }
}

/// Frame `payload` and write it packet by packet, returning the packet count.
pub async fn write_frame_async<W>(
    writer: &mut W,
    payload: &[u8],
    max_packet_size: Option<usize>,
) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let frame = pack(payload);
    let mut count = 0usize;
    for packet in packetize(&frame, max_packet_size) {
        writer.write_all(packet).await?;
        writer.flush().await?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_read_reassembles_packets() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut frames = FramedRead::new(server, FrameCodec::default());

        let sent = write_frame_async(&mut client, b"\x21print('hi')\x00", Some(5))
            .await
            .unwrap();
        assert!(sent > 1);
        drop(client);

        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"\x21print('hi')\x00");
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_write_packs_payloads() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, FrameCodec::default());
        let mut frames = FramedRead::new(server, FrameCodec::default());

        sink.send(Bytes::from_static(b"\x28\x88\x13")).await.unwrap();

        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"\x28\x88\x13");
    }

    #[test]
    fn decoder_waits_for_delimiter() {
        let mut codec = FrameCodec::default();
        let frame = pack(b"\x00");
        let mut buf = BytesMut::from(&frame[..frame.len() - 1]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&frame[frame.len() - 1..]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), b"\x00");
    }
}
