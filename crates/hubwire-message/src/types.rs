//! Message type identifiers.
//!
//! The type byte is always the first byte of a serialized message and selects
//! its decoding schema.

use std::fmt;

use serde::Serialize;

/// Every message type known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum MessageType {
    InfoRequest = 0x00,
    InfoResponse = 0x01,
    StartFileUploadRequest = 0x0C,
    StartFileUploadResponse = 0x0D,
    TransferChunkRequest = 0x10,
    TransferChunkResponse = 0x11,
    ProgramFlowRequest = 0x1E,
    ProgramFlowResponse = 0x1F,
    ProgramFlowNotification = 0x20,
    ConsoleNotification = 0x21,
    DeviceNotificationRequest = 0x28,
    DeviceNotificationResponse = 0x29,
    DeviceNotification = 0x3C,
    ClearSlotRequest = 0x46,
    ClearSlotResponse = 0x47,
}

/// Role of a message in the exchange discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Host to hub.
    Request,
    /// Hub to host, correlated with a request.
    Response,
    /// Hub to host, unsolicited.
    Notification,
}

impl MessageType {
    /// All registered types in id order.
    pub const ALL: [MessageType; 15] = [
        MessageType::InfoRequest,
        MessageType::InfoResponse,
        MessageType::StartFileUploadRequest,
        MessageType::StartFileUploadResponse,
        MessageType::TransferChunkRequest,
        MessageType::TransferChunkResponse,
        MessageType::ProgramFlowRequest,
        MessageType::ProgramFlowResponse,
        MessageType::ProgramFlowNotification,
        MessageType::ConsoleNotification,
        MessageType::DeviceNotificationRequest,
        MessageType::DeviceNotificationResponse,
        MessageType::DeviceNotification,
        MessageType::ClearSlotRequest,
        MessageType::ClearSlotResponse,
    ];

    /// The type byte.
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Look up a type byte.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.id() == id)
    }

    pub const fn name(self) -> &'static str {
        match self {
            MessageType::InfoRequest => "InfoRequest",
            MessageType::InfoResponse => "InfoResponse",
            MessageType::StartFileUploadRequest => "StartFileUploadRequest",
            MessageType::StartFileUploadResponse => "StartFileUploadResponse",
            MessageType::TransferChunkRequest => "TransferChunkRequest",
            MessageType::TransferChunkResponse => "TransferChunkResponse",
            MessageType::ProgramFlowRequest => "ProgramFlowRequest",
            MessageType::ProgramFlowResponse => "ProgramFlowResponse",
            MessageType::ProgramFlowNotification => "ProgramFlowNotification",
            MessageType::ConsoleNotification => "ConsoleNotification",
            MessageType::DeviceNotificationRequest => "DeviceNotificationRequest",
            MessageType::DeviceNotificationResponse => "DeviceNotificationResponse",
            MessageType::DeviceNotification => "DeviceNotification",
            MessageType::ClearSlotRequest => "ClearSlotRequest",
            MessageType::ClearSlotResponse => "ClearSlotResponse",
        }
    }

    pub const fn direction(self) -> Direction {
        match self {
            MessageType::InfoRequest
            | MessageType::StartFileUploadRequest
            | MessageType::TransferChunkRequest
            | MessageType::ProgramFlowRequest
            | MessageType::DeviceNotificationRequest
            | MessageType::ClearSlotRequest => Direction::Request,
            MessageType::InfoResponse
            | MessageType::StartFileUploadResponse
            | MessageType::TransferChunkResponse
            | MessageType::ProgramFlowResponse
            | MessageType::DeviceNotificationResponse
            | MessageType::ClearSlotResponse => Direction::Response,
            MessageType::ProgramFlowNotification
            | MessageType::ConsoleNotification
            | MessageType::DeviceNotification => Direction::Notification,
        }
    }

    /// The response type a request is answered with.
    pub const fn response_type(self) -> Option<MessageType> {
        match self {
            MessageType::InfoRequest => Some(MessageType::InfoResponse),
            MessageType::StartFileUploadRequest => Some(MessageType::StartFileUploadResponse),
            MessageType::TransferChunkRequest => Some(MessageType::TransferChunkResponse),
            MessageType::ProgramFlowRequest => Some(MessageType::ProgramFlowResponse),
            MessageType::DeviceNotificationRequest => {
                Some(MessageType::DeviceNotificationResponse)
            }
            MessageType::ClearSlotRequest => Some(MessageType::ClearSlotResponse),
            _ => None,
        }
    }

    /// Responses made of a type byte and a single status byte.
    pub const fn is_status_response(self) -> bool {
        matches!(
            self,
            MessageType::StartFileUploadResponse
                | MessageType::TransferChunkResponse
                | MessageType::ProgramFlowResponse
                | MessageType::DeviceNotificationResponse
                | MessageType::ClearSlotResponse
        )
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(id: u8) -> std::result::Result<Self, u8> {
        Self::from_id(id).ok_or(id)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
