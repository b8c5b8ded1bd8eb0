/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame contained no block data between its optional priority byte and delimiter.
    #[error("empty frame")]
    EmptyFrame,

    /// A byte that can never appear in stuffed data (a code word or data byte <= 0x02).
    #[error("unexpected byte 0x{byte:02x} at offset {offset} in stuffed data")]
    UnexpectedByte { offset: usize, byte: u8 },

    /// The stuffed data ended before the current block was complete.
    #[error("truncated block ({missing} bytes missing)")]
    TruncatedBlock { missing: usize },

    /// A frame passed to `unpack` did not end with the delimiter.
    #[error("frame is not delimiter-terminated")]
    Unterminated,

    /// The buffered or encoded frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing packets.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for faults confined to a single frame; the stream can keep decoding after them.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FrameError::Io(_) | FrameError::ConnectionClosed)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
