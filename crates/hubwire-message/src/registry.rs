use std::collections::HashMap;

use crate::device::{DeviceNotification, DEVICE_NOTIFICATION_HEADER};
use crate::error::{MessageError, Result};
use crate::message::{
    expect_len, InfoResponse, Message, StartFileUpload, StatusResponse, TransferChunk,
};
use crate::types::MessageType;

/// Decoder for one message type. Receives the whole message, type byte included.
pub type DecodeFn = fn(&[u8]) -> Result<Message>;

/// A registered message type and its decoder.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub message_type: MessageType,
    pub decode: DecodeFn,
}

static ENTRIES: [Entry; 15] = [
    entry(MessageType::InfoRequest, decode_info_request),
    entry(MessageType::InfoResponse, decode_info_response),
    entry(MessageType::StartFileUploadRequest, decode_start_file_upload),
    entry(MessageType::StartFileUploadResponse, decode_status),
    entry(MessageType::TransferChunkRequest, decode_transfer_chunk),
    entry(MessageType::TransferChunkResponse, decode_status),
    entry(MessageType::ProgramFlowRequest, decode_program_flow_request),
    entry(MessageType::ProgramFlowResponse, decode_status),
    entry(MessageType::ProgramFlowNotification, decode_program_flow_notification),
    entry(MessageType::ConsoleNotification, decode_console),
    entry(MessageType::DeviceNotificationRequest, decode_device_request),
    entry(MessageType::DeviceNotificationResponse, decode_status),
    entry(MessageType::DeviceNotification, decode_device_notification),
    entry(MessageType::ClearSlotRequest, decode_clear_slot),
    entry(MessageType::ClearSlotResponse, decode_status),
];

const fn entry(message_type: MessageType, decode: DecodeFn) -> Entry {
    Entry {
        message_type,
        decode,
    }
}

/// The built-in table, in id order.
pub fn registered() -> &'static [Entry] {
    &ENTRIES
}

/// Find the entry for a type byte.
pub fn lookup(type_id: u8) -> Option<&'static Entry> {
    ENTRIES
        .iter()
        .find(|entry| entry.message_type.id() == type_id)
}

/// Decode one message from the built-in table.
pub fn decode(data: &[u8]) -> Result<Message> {
    let (&type_id, _) = data.split_first().ok_or(MessageError::Empty)?;
    match lookup(type_id) {
        Some(entry) => (entry.decode)(data),
        None => Err(MessageError::UnknownType {
            type_id,
            raw: data.to_vec(),
        }),
    }
}

/// Encode one message.
pub fn encode(message: &Message) -> Vec<u8> {
    message.encode()
}

/// Type-keyed decoder table.
///
/// Starts from the built-in table; entries can be replaced or added, for
/// instance to decode a firmware extension without forking the crate.
pub struct MessageRegistry {
    decoders: HashMap<u8, DecodeFn>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self {
            decoders: ENTRIES
                .iter()
                .map(|entry| (entry.message_type.id(), entry.decode))
                .collect(),
        }
    }

    /// Register (or replace) the decoder for a type byte.
    pub fn register(&mut self, type_id: u8, decode: DecodeFn) -> Option<DecodeFn> {
        self.decoders.insert(type_id, decode)
    }

    pub fn decode(&self, data: &[u8]) -> Result<Message> {
        let (&type_id, _) = data.split_first().ok_or(MessageError::Empty)?;
        match self.decoders.get(&type_id) {
            Some(decode) => decode(data),
            None => Err(MessageError::UnknownType {
                type_id,
                raw: data.to_vec(),
            }),
        }
    }

    pub fn has_type(&self, type_id: u8) -> bool {
        self.decoders.contains_key(&type_id)
    }

    /// Registered type bytes, sorted.
    pub fn type_ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.decoders.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_info_request(data: &[u8]) -> Result<Message> {
    expect_len(MessageType::InfoRequest, data, 1)?;
    Ok(Message::InfoRequest)
}

fn decode_info_response(data: &[u8]) -> Result<Message> {
    InfoResponse::decode(data).map(Message::InfoResponse)
}

fn decode_start_file_upload(data: &[u8]) -> Result<Message> {
    StartFileUpload::decode(data).map(Message::StartFileUploadRequest)
}

fn decode_transfer_chunk(data: &[u8]) -> Result<Message> {
    TransferChunk::decode(data).map(Message::TransferChunkRequest)
}

fn decode_status(data: &[u8]) -> Result<Message> {
    let type_id = data.first().copied().ok_or(MessageError::Empty)?;
    let message_type = MessageType::from_id(type_id).ok_or_else(|| MessageError::UnknownType {
        type_id,
        raw: data.to_vec(),
    })?;
    let status = StatusResponse::decode(message_type, data)?;
    Ok(match message_type {
        MessageType::ClearSlotResponse => Message::ClearSlotResponse(status),
        MessageType::StartFileUploadResponse => Message::StartFileUploadResponse(status),
        MessageType::TransferChunkResponse => Message::TransferChunkResponse(status),
        MessageType::ProgramFlowResponse => Message::ProgramFlowResponse(status),
        MessageType::DeviceNotificationResponse => Message::DeviceNotificationResponse(status),
        other => {
            return Err(MessageError::InvalidField {
                message: other,
                field: "type",
                reason: "not a status response".to_string(),
            })
        }
    })
}

fn decode_program_flow_request(data: &[u8]) -> Result<Message> {
    expect_len(MessageType::ProgramFlowRequest, data, 3)?;
    Ok(Message::ProgramFlowRequest {
        stop: flag(MessageType::ProgramFlowRequest, data[1])?,
        slot: data[2],
    })
}

fn decode_program_flow_notification(data: &[u8]) -> Result<Message> {
    expect_len(MessageType::ProgramFlowNotification, data, 2)?;
    Ok(Message::ProgramFlowNotification {
        stop: flag(MessageType::ProgramFlowNotification, data[1])?,
    })
}

fn decode_console(data: &[u8]) -> Result<Message> {
    let mut text = data.get(1..).unwrap_or_default();
    while let [rest @ .., 0] = text {
        text = rest;
    }
    Ok(Message::ConsoleNotification {
        text: String::from_utf8_lossy(text).into_owned(),
    })
}

fn decode_device_request(data: &[u8]) -> Result<Message> {
    expect_len(MessageType::DeviceNotificationRequest, data, 3)?;
    Ok(Message::DeviceNotificationRequest {
        interval_ms: u16::from_le_bytes([data[1], data[2]]),
    })
}

fn decode_device_notification(data: &[u8]) -> Result<Message> {
    if data.len() < DEVICE_NOTIFICATION_HEADER {
        return Err(MessageError::SizeMismatch {
            message: MessageType::DeviceNotification,
            expected: DEVICE_NOTIFICATION_HEADER,
            actual: data.len(),
        });
    }
    let declared = u16::from_le_bytes([data[1], data[2]]);
    let payload = data[DEVICE_NOTIFICATION_HEADER..].to_vec();
    Ok(Message::DeviceNotification(DeviceNotification::parse(
        declared, payload,
    )))
}

fn decode_clear_slot(data: &[u8]) -> Result<Message> {
    expect_len(MessageType::ClearSlotRequest, data, 2)?;
    Ok(Message::ClearSlotRequest { slot: data[1] })
}

fn flag(message: MessageType, byte: u8) -> Result<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(MessageError::InvalidField {
            message,
            field: "stop",
            reason: format!("expected 0 or 1, got {other}"),
        }),
    }
}
