use bytes::BytesMut;
use hubwire_frame::{decode_frame, pack, DEFAULT_MAX_FRAME_SIZE};
use hubwire_message::Message;

use crate::error::Result;

/// Encode a message into one delimiter-terminated wire frame.
pub fn encode_request(message: &Message) -> Vec<u8> {
    pack(&message.encode())
}

/// Inbound side of a session: transport chunks in, decoded messages out.
///
/// Chunks may end anywhere inside a frame; the remainder is kept until the
/// delimiter arrives. Frames are consumed before they are decoded, so one bad
/// frame yields one error and decoding resumes with the next frame.
#[derive(Debug)]
pub struct MessageStream {
    buf: BytesMut,
    max_frame_size: usize,
}

impl MessageStream {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Feed one transport chunk, returning every message it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Message>> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        loop {
            match decode_frame(&mut self.buf, self.max_frame_size) {
                Ok(Some(frame)) => out.push(Message::decode(&frame).map_err(Into::into)),
                Ok(None) => break,
                Err(err) => out.push(Err(err.into())),
            }
        }
        out
    }

    /// Bytes held from an incomplete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partially received frame.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

impl Default for MessageStream {
    fn default() -> Self {
        Self::new()
    }
}
