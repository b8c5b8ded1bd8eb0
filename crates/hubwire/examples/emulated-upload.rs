//! Upload a program to an emulated hub running on another thread.
//!
//! Run with:
//!   cargo run --example emulated-upload --features peer
//!
//! The emulated hub accepts every request, reports 20-byte packets and
//! chunks, and prints what it receives.

use std::io::{self, Write};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hubwire::frame::{packetize, FrameWriter};
use hubwire::message::{InfoResponse, Message, StatusResponse};
use hubwire::peer::{encode_request, Exchange, MessageStream, UploadOptions};

/// Transport stand-in: every packet the host writes goes to the hub thread.
struct Link(Sender<Vec<u8>>);

impl Write for Link {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .send(data.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn answer(request: &Message) -> Vec<Message> {
    let ok = StatusResponse::SUCCESS;
    match request {
        Message::InfoRequest => vec![Message::InfoResponse(InfoResponse {
            rpc_major: 1,
            rpc_minor: 0,
            rpc_build: 0,
            firmware_major: 1,
            firmware_minor: 0,
            firmware_build: 0,
            max_packet_size: 20,
            max_message_size: 512,
            max_chunk_size: 20,
            product_group_device: 0,
        })],
        Message::ClearSlotRequest { .. } => vec![Message::ClearSlotResponse(ok)],
        Message::StartFileUploadRequest(_) => vec![Message::StartFileUploadResponse(ok)],
        Message::TransferChunkRequest(_) => vec![Message::TransferChunkResponse(ok)],
        Message::ProgramFlowRequest { stop, .. } => vec![
            Message::ProgramFlowResponse(ok),
            Message::ProgramFlowNotification { stop: *stop },
            Message::ConsoleNotification {
                text: "hello from the hub\n".to_string(),
            },
        ],
        _ => Vec::new(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let exchange = Arc::new(Exchange::new(FrameWriter::new(Link(tx))));
    let notifications = exchange
        .subscribe()
        .ok_or("notification receiver already taken")?;

    let hub = {
        let exchange = Arc::downgrade(&exchange);
        thread::spawn(move || {
            let mut inbound = MessageStream::new();
            for packet in rx {
                for request in inbound.feed(&packet) {
                    let request = match request {
                        Ok(request) => request,
                        Err(err) => {
                            eprintln!("hub: bad frame: {err}");
                            continue;
                        }
                    };
                    eprintln!("hub <- {}", request.message_type());
                    let Some(exchange) = exchange.upgrade() else {
                        return;
                    };
                    for reply in answer(&request) {
                        for packet in packetize(&encode_request(&reply), Some(20)) {
                            exchange.receive(packet);
                        }
                    }
                }
            }
        })
    };

    let program = b"from hub import light_matrix\nlight_matrix.write('Hi')\n";
    let report = exchange.upload_program(
        program,
        &UploadOptions {
            slot: 1,
            file_name: "hello.py".to_string(),
            ..UploadOptions::default()
        },
    )?;
    eprintln!(
        "uploaded {} bytes in {} chunks (crc {:08x})",
        report.bytes, report.chunks, report.file_crc
    );

    while let Ok(notification) = notifications.recv_timeout(Duration::from_millis(200)) {
        eprintln!("notification: {notification:?}");
    }

    drop(exchange);
    let _ = hub.join();
    Ok(())
}
