//! Typed messages for the hub wire protocol.
//!
//! A message is a type byte followed by a fixed little-endian layout (or, for
//! a few types, a length-delimited body). [`Message::encode`] and
//! [`decode`] are pure functions; framing lives in `hubwire-frame`.

pub mod device;
pub mod error;
pub mod message;
pub mod registry;
pub mod types;

pub use device::{
    layout_for, DeviceNotification, DeviceRecord, DeviceRecordKind, FieldLayout, FieldType,
    PartialParse, RecordLayout, RECORD_LAYOUTS,
};
pub use error::{MessageError, Result};
pub use message::{
    InfoResponse, Message, StartFileUpload, StatusResponse, TransferChunk, MAX_CHUNK_LEN,
    MAX_FILE_NAME_LEN,
};
pub use registry::{decode, encode, lookup, registered, DecodeFn, Entry, MessageRegistry};
pub use types::{Direction, MessageType};
