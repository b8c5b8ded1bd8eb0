//! In-memory hub used by the unit tests.

use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use hubwire_frame::{pack, packetize, unpack, DELIMITER};
use hubwire_message::{InfoResponse, Message};

use crate::exchange::Exchange;

/// Collects written packets and forwards each completed wire frame.
pub(crate) struct FrameSink {
    buf: Vec<u8>,
    tx: Sender<Vec<u8>>,
}

impl FrameSink {
    pub(crate) fn new() -> (Self, Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                buf: Vec::new(),
                tx,
            },
            rx,
        )
    }
}

impl Write for FrameSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        while let Some(end) = self.buf.iter().position(|&byte| byte == DELIMITER) {
            let frame: Vec<u8> = self.buf.drain(..=end).collect();
            // The test may already have stopped listening.
            let _ = self.tx.send(frame);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Answer every request written to `frames` with the messages `respond` returns.
///
/// Replies are fed back in 7-byte packets. The thread ends once the exchange
/// (and with it the sink) is dropped, returning the requests it saw.
pub(crate) fn spawn_hub<F>(
    exchange: &Arc<Exchange<FrameSink>>,
    frames: Receiver<Vec<u8>>,
    respond: F,
) -> JoinHandle<Vec<Message>>
where
    F: Fn(&Message) -> Vec<Message> + Send + 'static,
{
    let exchange: Weak<Exchange<FrameSink>> = Arc::downgrade(exchange);
    thread::spawn(move || {
        let mut seen = Vec::new();
        for frame in frames {
            let request = Message::decode(&unpack(&frame).unwrap()).unwrap();
            let replies = respond(&request);
            seen.push(request);

            let Some(exchange) = exchange.upgrade() else {
                break;
            };
            for reply in replies {
                let wire = pack(&reply.encode());
                for packet in packetize(&wire, Some(7)) {
                    assert!(exchange.receive(packet).is_empty());
                }
            }
        }
        seen
    })
}

pub(crate) fn info_response(chunk_size: u16) -> InfoResponse {
    InfoResponse {
        rpc_major: 1,
        rpc_minor: 0,
        rpc_build: 0,
        firmware_major: 1,
        firmware_minor: 0,
        firmware_build: 0,
        max_packet_size: chunk_size,
        max_message_size: 1000,
        max_chunk_size: chunk_size,
        product_group_device: 0,
    }
}
