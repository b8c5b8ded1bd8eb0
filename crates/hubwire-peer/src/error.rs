use hubwire_message::MessageType;

/// Errors that can occur in exchange operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] hubwire_frame::FrameError),

    /// Message encoding or decoding error.
    #[error("message error: {0}")]
    Message(#[from] hubwire_message::MessageError),

    /// The hub answered with a failure status.
    #[error("{message} failed with status 0x{status:02x}")]
    Status { message: MessageType, status: u8 },

    /// No matching response arrived in time.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The pending request was cancelled before its response arrived.
    #[error("request cancelled")]
    Cancelled,

    /// Another request is still awaiting its response.
    #[error("exchange busy: awaiting {expected}")]
    Busy { expected: MessageType },

    /// The message has no response type, so it cannot be used as a request.
    #[error("{0} is not a request")]
    NotARequest(MessageType),

    /// A response of the wrong shape arrived for a request.
    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: MessageType,
        actual: MessageType,
    },

    /// A setting that cannot be used, such as a zero chunk size.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The transport is gone.
    #[error("peer disconnected: {0}")]
    Disconnected(String),
}

impl PeerError {
    /// True when the session can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PeerError::Frame(err) => err.is_recoverable(),
            PeerError::Disconnected(_) => false,
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
