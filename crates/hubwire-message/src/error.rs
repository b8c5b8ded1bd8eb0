use crate::types::MessageType;

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// A frame carried no bytes at all.
    #[error("empty message")]
    Empty,

    /// The type byte matches no registered message.
    #[error("unknown message type 0x{type_id:02x}: {}", hex_dump(.raw))]
    UnknownType { type_id: u8, raw: Vec<u8> },

    /// The byte count differs from the fixed or declared size of the message.
    #[error("{message} size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        message: MessageType,
        expected: usize,
        actual: usize,
    },

    /// A device notification stopped parsing before its payload was exhausted.
    #[error(
        "device notification parse stopped at offset {offset} (sub-type 0x{sub_type:02x}), {dropped} bytes dropped"
    )]
    PartialParse {
        offset: usize,
        sub_type: u8,
        dropped: usize,
    },

    /// An outbound field exceeds its fixed-width budget.
    #[error("{field} too long ({len} bytes, max {max})")]
    EncodingConstraint {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A field holds a value its encoding cannot represent.
    #[error("invalid {field} in {message}: {reason}")]
    InvalidField {
        message: MessageType,
        field: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, MessageError>;

fn hex_dump(raw: &[u8]) -> String {
    raw.iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_message_includes_raw_bytes() {
        let err = MessageError::UnknownType {
            type_id: 0xEE,
            raw: vec![0xEE, 0x01, 0xA0],
        };
        assert_eq!(err.to_string(), "unknown message type 0xee: ee 01 a0");
    }

    #[test]
    fn size_mismatch_names_the_message() {
        let err = MessageError::SizeMismatch {
            message: MessageType::InfoResponse,
            expected: 17,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "InfoResponse size mismatch: expected 17 bytes, got 3"
        );
    }
}
