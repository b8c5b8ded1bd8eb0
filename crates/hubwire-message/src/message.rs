use bytes::{Buf, BufMut};
use serde::Serialize;

use crate::device::{DeviceNotification, DEVICE_NOTIFICATION_HEADER};
use crate::error::{MessageError, Result};
use crate::types::MessageType;

/// Longest file name accepted by the hub, in UTF-8 bytes (NUL terminator excluded).
pub const MAX_FILE_NAME_LEN: usize = 31;

/// Largest chunk a single transfer request can describe.
pub const MAX_CHUNK_LEN: usize = u16::MAX as usize;

/// A message of any registered type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Message {
    InfoRequest,
    InfoResponse(InfoResponse),
    ClearSlotRequest { slot: u8 },
    ClearSlotResponse(StatusResponse),
    StartFileUploadRequest(StartFileUpload),
    StartFileUploadResponse(StatusResponse),
    TransferChunkRequest(TransferChunk),
    TransferChunkResponse(StatusResponse),
    ProgramFlowRequest { stop: bool, slot: u8 },
    ProgramFlowResponse(StatusResponse),
    ProgramFlowNotification { stop: bool },
    ConsoleNotification { text: String },
    DeviceNotificationRequest { interval_ms: u16 },
    DeviceNotificationResponse(StatusResponse),
    DeviceNotification(DeviceNotification),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::InfoRequest => MessageType::InfoRequest,
            Message::InfoResponse(_) => MessageType::InfoResponse,
            Message::ClearSlotRequest { .. } => MessageType::ClearSlotRequest,
            Message::ClearSlotResponse(_) => MessageType::ClearSlotResponse,
            Message::StartFileUploadRequest(_) => MessageType::StartFileUploadRequest,
            Message::StartFileUploadResponse(_) => MessageType::StartFileUploadResponse,
            Message::TransferChunkRequest(_) => MessageType::TransferChunkRequest,
            Message::TransferChunkResponse(_) => MessageType::TransferChunkResponse,
            Message::ProgramFlowRequest { .. } => MessageType::ProgramFlowRequest,
            Message::ProgramFlowResponse(_) => MessageType::ProgramFlowResponse,
            Message::ProgramFlowNotification { .. } => MessageType::ProgramFlowNotification,
            Message::ConsoleNotification { .. } => MessageType::ConsoleNotification,
            Message::DeviceNotificationRequest { .. } => MessageType::DeviceNotificationRequest,
            Message::DeviceNotificationResponse(_) => MessageType::DeviceNotificationResponse,
            Message::DeviceNotification(_) => MessageType::DeviceNotification,
        }
    }

    /// The type byte.
    pub fn type_id(&self) -> u8 {
        self.message_type().id()
    }

    /// Start-upload request, rejecting file names the hub cannot store.
    pub fn start_file_upload(file_name: impl Into<String>, slot: u8, crc: u32) -> Result<Self> {
        StartFileUpload::new(file_name, slot, crc).map(Message::StartFileUploadRequest)
    }

    /// Transfer-chunk request, rejecting chunks whose size does not fit the length field.
    pub fn transfer_chunk(running_crc: u32, payload: impl Into<Vec<u8>>) -> Result<Self> {
        TransferChunk::new(running_crc, payload).map(Message::TransferChunkRequest)
    }

    /// The status of a status-family response.
    pub fn status(&self) -> Option<StatusResponse> {
        match self {
            Message::ClearSlotResponse(status)
            | Message::StartFileUploadResponse(status)
            | Message::TransferChunkResponse(status)
            | Message::ProgramFlowResponse(status)
            | Message::DeviceNotificationResponse(status) => Some(*status),
            _ => None,
        }
    }

    /// Serialize, type byte first.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len_hint());
        buf.put_u8(self.type_id());
        match self {
            Message::InfoRequest => {}
            Message::InfoResponse(info) => info.encode_into(&mut buf),
            Message::ClearSlotRequest { slot } => buf.put_u8(*slot),
            Message::StartFileUploadRequest(upload) => upload.encode_into(&mut buf),
            Message::TransferChunkRequest(chunk) => chunk.encode_into(&mut buf),
            Message::ProgramFlowRequest { stop, slot } => {
                buf.put_u8(u8::from(*stop));
                buf.put_u8(*slot);
            }
            Message::ProgramFlowNotification { stop } => buf.put_u8(u8::from(*stop)),
            Message::ConsoleNotification { text } => {
                buf.put_slice(text.as_bytes());
                buf.put_u8(0);
            }
            Message::DeviceNotificationRequest { interval_ms } => buf.put_u16_le(*interval_ms),
            Message::DeviceNotification(notification) => notification.encode_into(&mut buf),
            Message::ClearSlotResponse(status)
            | Message::StartFileUploadResponse(status)
            | Message::TransferChunkResponse(status)
            | Message::ProgramFlowResponse(status)
            | Message::DeviceNotificationResponse(status) => buf.put_u8(status.code),
        }
        buf
    }

    /// Deserialize by dispatching on the type byte.
    pub fn decode(data: &[u8]) -> Result<Self> {
        crate::registry::decode(data)
    }

    fn encoded_len_hint(&self) -> usize {
        match self {
            Message::InfoResponse(_) => InfoResponse::WIRE_LEN,
            Message::StartFileUploadRequest(upload) => upload.file_name.len() + 7,
            Message::TransferChunkRequest(chunk) => chunk.payload.len() + 7,
            Message::ConsoleNotification { text } => text.len() + 2,
            Message::DeviceNotification(notification) => {
                notification.payload().len() + DEVICE_NOTIFICATION_HEADER
            }
            _ => 3,
        }
    }
}

/// Hub capabilities and firmware versions (type 0x01).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InfoResponse {
    pub rpc_major: u8,
    pub rpc_minor: u8,
    pub rpc_build: u16,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub firmware_build: u16,
    pub max_packet_size: u16,
    pub max_message_size: u16,
    pub max_chunk_size: u16,
    pub product_group_device: u16,
}

impl InfoResponse {
    pub const WIRE_LEN: usize = 17;

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u8(self.rpc_major);
        buf.put_u8(self.rpc_minor);
        buf.put_u16_le(self.rpc_build);
        buf.put_u8(self.firmware_major);
        buf.put_u8(self.firmware_minor);
        buf.put_u16_le(self.firmware_build);
        buf.put_u16_le(self.max_packet_size);
        buf.put_u16_le(self.max_message_size);
        buf.put_u16_le(self.max_chunk_size);
        buf.put_u16_le(self.product_group_device);
    }

    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        expect_len(MessageType::InfoResponse, data, Self::WIRE_LEN)?;
        let mut src = &data[1..];
        Ok(Self {
            rpc_major: src.get_u8(),
            rpc_minor: src.get_u8(),
            rpc_build: src.get_u16_le(),
            firmware_major: src.get_u8(),
            firmware_minor: src.get_u8(),
            firmware_build: src.get_u16_le(),
            max_packet_size: src.get_u16_le(),
            max_message_size: src.get_u16_le(),
            max_chunk_size: src.get_u16_le(),
            product_group_device: src.get_u16_le(),
        })
    }
}

/// Shared shape of the boolean status responses: one status byte, 0 = success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub code: u8,
}

impl StatusResponse {
    pub const SUCCESS: StatusResponse = StatusResponse { code: 0x00 };

    pub fn failure(code: u8) -> Self {
        Self { code }
    }

    pub fn is_success(self) -> bool {
        self.code == 0x00
    }

    pub(crate) fn decode(message: MessageType, data: &[u8]) -> Result<Self> {
        expect_len(message, data, 2)?;
        Ok(Self { code: data[1] })
    }
}

/// Start-upload request body (type 0x0C).
///
/// The file name is validated on construction, so an encodable value always
/// fits the hub's 32-byte name field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartFileUpload {
    file_name: String,
    slot: u8,
    crc: u32,
}

impl StartFileUpload {
    pub fn new(file_name: impl Into<String>, slot: u8, crc: u32) -> Result<Self> {
        let file_name = file_name.into();
        if file_name.len() > MAX_FILE_NAME_LEN {
            return Err(MessageError::EncodingConstraint {
                field: "file name",
                len: file_name.len(),
                max: MAX_FILE_NAME_LEN,
            });
        }
        if file_name.as_bytes().contains(&0) {
            return Err(MessageError::InvalidField {
                message: MessageType::StartFileUploadRequest,
                field: "file name",
                reason: "contains a NUL byte".to_string(),
            });
        }
        Ok(Self {
            file_name,
            slot,
            crc,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// CRC of the whole file.
    pub fn crc(&self) -> u32 {
        self.crc
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_slice(self.file_name.as_bytes());
        buf.put_u8(0);
        buf.put_u8(self.slot);
        buf.put_u32_le(self.crc);
    }

    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        let message = MessageType::StartFileUploadRequest;
        let body = data.get(1..).unwrap_or_default();
        let nul = body
            .iter()
            .position(|&byte| byte == 0)
            .ok_or_else(|| MessageError::InvalidField {
                message,
                field: "file name",
                reason: "missing NUL terminator".to_string(),
            })?;
        expect_len(message, data, 1 + nul + 1 + 5)?;

        let file_name =
            std::str::from_utf8(&body[..nul]).map_err(|err| MessageError::InvalidField {
                message,
                field: "file name",
                reason: err.to_string(),
            })?;
        let mut src = &body[nul + 1..];
        let slot = src.get_u8();
        let crc = src.get_u32_le();
        Self::new(file_name, slot, crc)
    }
}

/// Transfer-chunk request body (type 0x10).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferChunk {
    running_crc: u32,
    #[serde(rename = "size", serialize_with = "serialize_len")]
    payload: Vec<u8>,
}

impl TransferChunk {
    const HEADER_LEN: usize = 7;

    pub fn new(running_crc: u32, payload: impl Into<Vec<u8>>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_CHUNK_LEN {
            return Err(MessageError::EncodingConstraint {
                field: "chunk payload",
                len: payload.len(),
                max: MAX_CHUNK_LEN,
            });
        }
        Ok(Self {
            running_crc,
            payload,
        })
    }

    /// CRC of every chunk up to and including this one.
    pub fn running_crc(&self) -> u32 {
        self.running_crc
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn size(&self) -> u16 {
        // Bounded by MAX_CHUNK_LEN on construction.
        self.payload.len() as u16
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u32_le(self.running_crc);
        buf.put_u16_le(self.size());
        buf.put_slice(&self.payload);
    }

    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        let message = MessageType::TransferChunkRequest;
        if data.len() < Self::HEADER_LEN {
            return Err(MessageError::SizeMismatch {
                message,
                expected: Self::HEADER_LEN,
                actual: data.len(),
            });
        }
        let mut src = &data[1..];
        let running_crc = src.get_u32_le();
        let size = usize::from(src.get_u16_le());
        expect_len(message, data, Self::HEADER_LEN + size)?;
        Self::new(running_crc, src.to_vec())
    }
}

fn serialize_len<S: serde::Serializer>(
    payload: &[u8],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(payload.len() as u64)
}

pub(crate) fn expect_len(message: MessageType, data: &[u8], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(MessageError::SizeMismatch {
            message,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
