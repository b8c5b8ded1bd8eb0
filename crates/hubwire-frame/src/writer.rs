use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, packetize, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes framed payloads to any `Write` transport, one packet at a time.
///
/// Each packet is written and flushed separately, so a datagram-style
/// transport (one `write` per BLE write-without-response) sees packets no
/// larger than the configured packet size.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Frame a payload and send it, returning the number of packets written.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        self.buf.clear();
        encode_frame(payload, &mut self.buf);

        if self.buf.len() > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: self.buf.len(),
                max: self.config.max_frame_size,
            });
        }

        let buf = std::mem::take(&mut self.buf);
        let result = self.write_packets(&buf);
        self.buf = buf;
        result
    }

    /// Send an already packed wire frame, returning the number of packets written.
    pub fn send_packed(&mut self, frame: &[u8]) -> Result<usize> {
        if frame.len() > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: frame.len(),
                max: self.config.max_frame_size,
            });
        }
        self.write_packets(frame)
    }

    fn write_packets(&mut self, frame: &[u8]) -> Result<usize> {
        let mut count = 0usize;
        for packet in packetize(frame, self.config.max_packet_size) {
            self.write_packet(packet)?;
            count += 1;
        }
        tracing::trace!(
            frame_len = frame.len(),
            packets = count,
            "frame written"
        );
        Ok(count)
    }

    fn write_packet(&mut self, packet: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < packet.len() {
            match self.inner.write(&packet[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying transport.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update the packet size for subsequent frames, e.g. after negotiation.
    pub fn set_max_packet_size(&mut self, max_packet_size: Option<usize>) {
        self.config.max_packet_size = max_packet_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
