use std::io::Write;

use hubwire_frame::{crc, crc_seeded};
use hubwire_message::{Message, StartFileUpload};
use serde::Serialize;

use crate::error::{PeerError, Result};
use crate::exchange::Exchange;

/// Settings for [`Exchange::upload_program`].
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Program slot to write.
    pub slot: u8,
    /// Name stored on the hub (at most 31 UTF-8 bytes).
    pub file_name: String,
    /// Start the program once the last chunk is accepted.
    pub start_program: bool,
    /// Chunk size to use instead of the negotiated one.
    pub chunk_size_override: Option<usize>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            slot: 0,
            file_name: "program.py".to_string(),
            start_program: true,
            chunk_size_override: None,
        }
    }
}

/// One chunk of an upload and the running CRC sent with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedChunk {
    pub index: usize,
    pub offset: usize,
    pub len: usize,
    pub running_crc: u32,
}

/// Split `data` into chunks of at most `chunk_size` bytes, each carrying the
/// CRC of the chunk seeded with the previous chunk's result.
pub fn plan_chunks(data: &[u8], chunk_size: usize) -> Result<Vec<PlannedChunk>> {
    if chunk_size == 0 {
        return Err(PeerError::Config("chunk size must be non-zero".to_string()));
    }

    let mut running_crc = 0u32;
    Ok(data
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, chunk)| {
            running_crc = crc_seeded(chunk, running_crc);
            PlannedChunk {
                index,
                offset: index * chunk_size,
                len: chunk.len(),
                running_crc,
            }
        })
        .collect())
}

/// State of one program upload: the start request, then the transfer
/// requests in order.
#[derive(Debug)]
pub struct UploadSession<'a> {
    data: &'a [u8],
    chunk_size: usize,
    start: StartFileUpload,
    offset: usize,
    running_crc: u32,
    chunks_sent: usize,
}

impl<'a> UploadSession<'a> {
    /// Validates the file name before anything is sent.
    pub fn new(data: &'a [u8], file_name: &str, slot: u8, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(PeerError::Config("chunk size must be non-zero".to_string()));
        }
        let start = StartFileUpload::new(file_name, slot, crc(data))?;
        Ok(Self {
            data,
            chunk_size,
            start,
            offset: 0,
            running_crc: 0,
            chunks_sent: 0,
        })
    }

    pub fn start_request(&self) -> Message {
        Message::StartFileUploadRequest(self.start.clone())
    }

    /// The next transfer request, or `None` once every byte is covered.
    pub fn next_chunk(&mut self) -> Option<Result<Message>> {
        if self.offset >= self.data.len() {
            return None;
        }
        let end = self.data.len().min(self.offset + self.chunk_size);
        let chunk = &self.data[self.offset..end];
        self.running_crc = crc_seeded(chunk, self.running_crc);
        self.offset = end;
        self.chunks_sent += 1;
        Some(Message::transfer_chunk(self.running_crc, chunk).map_err(Into::into))
    }

    /// CRC of the whole file, as sent in the start request.
    pub fn file_crc(&self) -> u32 {
        self.start.crc()
    }

    pub fn slot(&self) -> u8 {
        self.start.slot()
    }

    pub fn bytes_sent(&self) -> usize {
        self.offset
    }

    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent
    }

    pub fn is_complete(&self) -> bool {
        self.offset >= self.data.len()
    }
}

/// Outcome of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub bytes: usize,
    pub chunks: usize,
    pub file_crc: u32,
    /// False when the hub refused to clear the slot (typically already empty).
    pub slot_cleared: bool,
    pub started: bool,
}

impl<W: Write> Exchange<W> {
    /// Upload a program and optionally start it.
    ///
    /// Clears the slot (a failure there is ignored), announces the file,
    /// transfers it chunk by chunk and starts it. Any other failure status
    /// aborts the sequence; nothing is retried.
    pub fn upload_program(&self, data: &[u8], options: &UploadOptions) -> Result<UploadReport> {
        // Negotiation below writes to the transport, so the name is checked first.
        StartFileUpload::new(&options.file_name, options.slot, 0)?;
        let chunk_size = match options.chunk_size_override {
            Some(size) => size,
            None => {
                let info = match self.info() {
                    Some(info) => info,
                    None => self.negotiate()?,
                };
                usize::from(info.max_chunk_size)
            }
        };
        let mut session = UploadSession::new(data, &options.file_name, options.slot, chunk_size)?;
        tracing::debug!(
            file = %options.file_name,
            slot = options.slot,
            bytes = data.len(),
            chunk_size,
            "starting upload"
        );

        let slot_cleared = self.clear_slot(options.slot)?;
        self.request_status(&session.start_request())?;

        while let Some(request) = session.next_chunk() {
            self.request_status(&request?)?;
            tracing::debug!(
                sent = session.bytes_sent(),
                total = data.len(),
                "chunk accepted"
            );
        }

        if options.start_program {
            self.start_program(options.slot)?;
        }

        Ok(UploadReport {
            bytes: data.len(),
            chunks: session.chunks_sent(),
            file_crc: session.file_crc(),
            slot_cleared,
            started: options.start_program,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hubwire_frame::FrameWriter;
    use hubwire_message::{MessageError, MessageType, StatusResponse, TransferChunk};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{info_response, spawn_hub, FrameSink};

    fn program(len: usize) -> Vec<u8> {
        (0..len).map(|i| b'a' + (i % 26) as u8).collect()
    }

    fn cooperative_hub(request: &Message) -> Vec<Message> {
        let ok = StatusResponse::SUCCESS;
        match request {
            Message::InfoRequest => vec![Message::InfoResponse(info_response(20))],
            Message::ClearSlotRequest { .. } => vec![Message::ClearSlotResponse(ok)],
            Message::StartFileUploadRequest(_) => vec![Message::StartFileUploadResponse(ok)],
            Message::TransferChunkRequest(_) => vec![Message::TransferChunkResponse(ok)],
            Message::ProgramFlowRequest { .. } => vec![Message::ProgramFlowResponse(ok)],
            _ => Vec::new(),
        }
    }

    #[test]
    fn plan_chains_running_crc() {
        let data = program(50);
        let plan = plan_chunks(&data, 20).unwrap();

        assert_eq!(
            plan.iter().map(|chunk| chunk.len).collect::<Vec<_>>(),
            vec![20, 20, 10]
        );
        assert_eq!(plan[0].running_crc, crc(&data[..20]));
        assert_eq!(
            plan[1].running_crc,
            crc_seeded(&data[20..40], plan[0].running_crc)
        );
        assert_eq!(plan[2].offset, 40);
    }

    #[test]
    fn plan_rejects_zero_chunk_size() {
        assert!(matches!(plan_chunks(b"abc", 0), Err(PeerError::Config(_))));
        assert!(plan_chunks(&[], 20).unwrap().is_empty());
    }

    #[test]
    fn session_matches_plan() {
        let data = program(45);
        let plan = plan_chunks(&data, 16).unwrap();
        let mut session = UploadSession::new(&data, "main.py", 2, 16).unwrap();

        let mut seen = Vec::new();
        while let Some(request) = session.next_chunk() {
            let Message::TransferChunkRequest(chunk) = request.unwrap() else {
                panic!("expected a transfer chunk");
            };
            seen.push(chunk.running_crc());
        }
        assert_eq!(
            seen,
            plan.iter().map(|chunk| chunk.running_crc).collect::<Vec<_>>()
        );
        assert!(session.is_complete());
        assert_eq!(session.file_crc(), crc(&data));
    }

    #[test]
    fn long_file_name_fails_before_anything_is_sent() {
        let (sink, frames) = FrameSink::new();
        let exchange = Exchange::new(FrameWriter::new(sink));
        let options = UploadOptions {
            file_name: "x".repeat(32),
            chunk_size_override: Some(20),
            ..UploadOptions::default()
        };

        let err = exchange.upload_program(b"print(1)", &options).unwrap_err();
        assert!(matches!(
            err,
            PeerError::Message(MessageError::EncodingConstraint { len: 32, .. })
        ));
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn long_file_name_fails_before_negotiation() {
        let (sink, frames) = FrameSink::new();
        let exchange = Exchange::new(FrameWriter::new(sink));
        assert_eq!(exchange.info(), None);
        let options = UploadOptions {
            file_name: "x".repeat(32),
            ..UploadOptions::default()
        };

        let err = exchange.upload_program(b"print(1)", &options).unwrap_err();
        assert!(matches!(
            err,
            PeerError::Message(MessageError::EncodingConstraint { len: 32, .. })
        ));
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn forty_bytes_at_chunk_size_twenty_is_two_chunks() {
        let (sink, frames) = FrameSink::new();
        let exchange = Arc::new(Exchange::new(FrameWriter::new(sink)));
        let hub = spawn_hub(&exchange, frames, cooperative_hub);

        let data = program(40);
        let report = exchange
            .upload_program(&data, &UploadOptions::default())
            .unwrap();
        assert_eq!(
            report,
            UploadReport {
                bytes: 40,
                chunks: 2,
                file_crc: crc(&data),
                slot_cleared: true,
                started: true,
            }
        );

        drop(exchange);
        let requests = hub.join().unwrap();
        let types: Vec<MessageType> = requests.iter().map(Message::message_type).collect();
        assert_eq!(
            types,
            vec![
                MessageType::InfoRequest,
                MessageType::ClearSlotRequest,
                MessageType::StartFileUploadRequest,
                MessageType::TransferChunkRequest,
                MessageType::TransferChunkRequest,
                MessageType::ProgramFlowRequest,
            ]
        );

        let chunks: Vec<&TransferChunk> = requests
            .iter()
            .filter_map(|request| match request {
                Message::TransferChunkRequest(chunk) => Some(chunk),
                _ => None,
            })
            .collect();
        let first = crc(&data[..20]);
        assert_eq!(chunks[0].running_crc(), first);
        assert_eq!(chunks[1].running_crc(), crc_seeded(&data[20..], first));
        assert_eq!(chunks[1].payload(), &data[20..]);
    }

    #[test]
    fn refused_chunk_aborts_without_starting() {
        let (sink, frames) = FrameSink::new();
        let exchange = Arc::new(Exchange::new(FrameWriter::new(sink)));
        let hub = spawn_hub(&exchange, frames, |request| match request {
            Message::ClearSlotRequest { .. } => {
                vec![Message::ClearSlotResponse(StatusResponse::failure(1))]
            }
            Message::TransferChunkRequest(_) => {
                vec![Message::TransferChunkResponse(StatusResponse::failure(1))]
            }
            other => cooperative_hub(other),
        });

        let options = UploadOptions {
            chunk_size_override: Some(10),
            ..UploadOptions::default()
        };
        let err = exchange.upload_program(&program(30), &options).unwrap_err();
        assert!(matches!(
            err,
            PeerError::Status {
                message: MessageType::TransferChunkResponse,
                status: 1
            }
        ));

        drop(exchange);
        let requests = hub.join().unwrap();
        assert_eq!(
            requests
                .iter()
                .filter(|r| r.message_type() == MessageType::TransferChunkRequest)
                .count(),
            1
        );
        assert!(requests
            .iter()
            .all(|r| r.message_type() != MessageType::ProgramFlowRequest));
    }
}
