use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hubwire_frame::{FrameError, FrameReader, FrameWriter, DEFAULT_MAX_FRAME_SIZE};
use hubwire_message::{InfoResponse, Message, MessageType};

use crate::error::{PeerError, Result};
use crate::stream::MessageStream;

/// Exchange coordinator configuration.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// How long a request waits for its response. Default: 5 s.
    pub response_timeout: Duration,
    /// Largest inbound frame accepted before the reassembly buffer is discarded.
    pub max_frame_size: usize,
    /// Notifications queued for the subscriber before new ones are dropped.
    pub notification_capacity: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            notification_capacity: 256,
        }
    }
}

/// The single outstanding request.
#[derive(Debug)]
struct Pending {
    id: u64,
    expected: MessageType,
    tx: SyncSender<Message>,
}

/// Request/response coordinator for one hub connection.
///
/// At most one request is in flight. Inbound messages are matched against it
/// by type alone; everything else is a notification and goes to the channel
/// returned by [`subscribe`](Self::subscribe).
///
/// All methods take `&self`: one thread feeds inbound bytes through
/// [`receive`](Self::receive) or [`pump`](Self::pump) while another issues
/// requests. Share it behind an `Arc`.
pub struct Exchange<W> {
    writer: Mutex<FrameWriter<W>>,
    stream: Mutex<MessageStream>,
    pending: Mutex<Option<Pending>>,
    next_id: AtomicU64,
    notify_tx: Mutex<SyncSender<Message>>,
    notify_rx: Mutex<Option<Receiver<Message>>>,
    info: Mutex<Option<InfoResponse>>,
    closed: AtomicBool,
    config: ExchangeConfig,
}

impl<W: Write> Exchange<W> {
    /// Wrap a frame writer with default configuration.
    pub fn new(writer: FrameWriter<W>) -> Self {
        Self::with_config(writer, ExchangeConfig::default())
    }

    pub fn with_config(writer: FrameWriter<W>, config: ExchangeConfig) -> Self {
        let (notify_tx, notify_rx) = mpsc::sync_channel(config.notification_capacity);
        Self {
            writer: Mutex::new(writer),
            stream: Mutex::new(MessageStream::with_max_frame_size(config.max_frame_size)),
            pending: Mutex::new(None),
            next_id: AtomicU64::new(1),
            notify_tx: Mutex::new(notify_tx),
            notify_rx: Mutex::new(Some(notify_rx)),
            info: Mutex::new(None),
            closed: AtomicBool::new(false),
            config,
        }
    }

    /// Take the notification receiver. Returns `None` after the first call.
    pub fn subscribe(&self) -> Option<Receiver<Message>> {
        lock(&self.notify_rx).take()
    }

    /// Send a message without waiting for anything back.
    pub fn send(&self, message: &Message) -> Result<()> {
        self.ensure_open()?;
        let packets = lock(&self.writer).send(&message.encode())?;
        tracing::trace!(message = %message.message_type(), packets, "message sent");
        Ok(())
    }

    /// Send a request and wait for its response with the configured timeout.
    pub fn request(&self, message: &Message) -> Result<Message> {
        self.request_with_timeout(message, self.config.response_timeout)
    }

    /// Send a request and wait up to `timeout` for the response type it expects.
    ///
    /// Fails with [`PeerError::Busy`] if another request is still pending.
    /// On timeout the pending slot is cleared and a later response of that
    /// type is treated as a notification.
    pub fn request_with_timeout(&self, message: &Message, timeout: Duration) -> Result<Message> {
        self.ensure_open()?;
        let request_type = message.message_type();
        let expected = request_type
            .response_type()
            .ok_or(PeerError::NotARequest(request_type))?;

        let (tx, rx) = mpsc::sync_channel(1);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = lock(&self.pending);
            if let Some(current) = pending.as_ref() {
                return Err(PeerError::Busy {
                    expected: current.expected,
                });
            }
            *pending = Some(Pending { id, expected, tx });
        }
        tracing::debug!(request = %request_type, %expected, "awaiting response");

        let sent = lock(&self.writer).send(&message.encode());
        if let Err(err) = sent {
            self.clear_pending(id);
            return Err(err.into());
        }

        match rx.recv_timeout(timeout) {
            Ok(response) => {
                tracing::debug!(response = %response.message_type(), "response received");
                Ok(response)
            }
            Err(RecvTimeoutError::Timeout) => {
                self.clear_pending(id);
                // The response may have landed between the timeout and the clear.
                if let Ok(response) = rx.try_recv() {
                    return Ok(response);
                }
                tracing::warn!(%expected, ?timeout, "request timed out");
                Err(PeerError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                if self.closed.load(Ordering::Acquire) {
                    Err(PeerError::Disconnected("transport closed".to_string()))
                } else {
                    Err(PeerError::Cancelled)
                }
            }
        }
    }

    /// Abort the pending request, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let cancelled = lock(&self.pending).take();
        if let Some(pending) = &cancelled {
            tracing::debug!(expected = %pending.expected, "pending request cancelled");
        }
        cancelled.is_some()
    }

    /// The response type the pending request is waiting for.
    pub fn pending(&self) -> Option<MessageType> {
        lock(&self.pending).as_ref().map(|pending| pending.expected)
    }

    /// Feed one inbound transport chunk.
    ///
    /// Completed messages are dispatched. Framing and decode faults do not
    /// stop the session; they are logged and returned.
    pub fn receive(&self, chunk: &[u8]) -> Vec<PeerError> {
        let decoded = lock(&self.stream).feed(chunk);
        let mut faults = Vec::new();
        for result in decoded {
            match result {
                Ok(message) => self.dispatch(message),
                Err(err) => {
                    tracing::warn!(error = %err, "discarding inbound frame");
                    faults.push(err);
                }
            }
        }
        faults
    }

    /// Read frames from `reader` until the transport closes.
    ///
    /// Recoverable faults are logged and skipped. A clean close cancels the
    /// pending request and marks the exchange disconnected.
    pub fn pump<R: Read>(&self, reader: &mut FrameReader<R>) -> Result<()> {
        loop {
            match reader.read_frame() {
                Ok(frame) => match Message::decode(&frame) {
                    Ok(message) => self.dispatch(message),
                    Err(err) => tracing::warn!(error = %err, "discarding inbound message"),
                },
                Err(FrameError::ConnectionClosed) => {
                    tracing::debug!("transport closed");
                    self.close();
                    return Ok(());
                }
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(error = %err, "discarding inbound frame");
                }
                Err(err) => {
                    self.close();
                    return Err(err.into());
                }
            }
        }
    }

    /// Mark the transport gone and fail the pending request.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Hub capabilities learned by [`negotiate`](Self::negotiate).
    pub fn info(&self) -> Option<InfoResponse> {
        *lock(&self.info)
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Query hub capabilities and adopt its packet size for outbound frames.
    pub fn negotiate(&self) -> Result<InfoResponse> {
        let info = match self.request(&Message::InfoRequest)? {
            Message::InfoResponse(info) => info,
            other => {
                return Err(PeerError::UnexpectedResponse {
                    expected: MessageType::InfoResponse,
                    actual: other.message_type(),
                })
            }
        };

        let packet_size = match info.max_packet_size {
            0 => None,
            size => Some(usize::from(size)),
        };
        lock(&self.writer).set_max_packet_size(packet_size);
        *lock(&self.info) = Some(info);
        tracing::debug!(
            max_packet_size = info.max_packet_size,
            max_chunk_size = info.max_chunk_size,
            "hub capabilities negotiated"
        );
        Ok(info)
    }

    /// Ask the hub to report device state every `interval_ms` milliseconds.
    pub fn enable_device_notifications(&self, interval_ms: u16) -> Result<()> {
        self.request_status(&Message::DeviceNotificationRequest { interval_ms })
    }

    /// Clear a program slot. An empty slot is reported as a failure by the
    /// hub, so failure is returned as `Ok(false)` rather than an error.
    pub fn clear_slot(&self, slot: u8) -> Result<bool> {
        match self.request_status(&Message::ClearSlotRequest { slot }) {
            Ok(()) => Ok(true),
            Err(PeerError::Status { status, .. }) => {
                tracing::warn!(slot, status, "clear slot failed, continuing");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub fn start_program(&self, slot: u8) -> Result<()> {
        self.request_status(&Message::ProgramFlowRequest { stop: false, slot })
    }

    pub fn stop_program(&self, slot: u8) -> Result<()> {
        self.request_status(&Message::ProgramFlowRequest { stop: true, slot })
    }

    /// Send a request whose response is a status byte, failing on a non-zero status.
    pub(crate) fn request_status(&self, message: &Message) -> Result<()> {
        let response = self.request(message)?;
        let response_type = response.message_type();
        let status = response.status().ok_or(PeerError::UnexpectedResponse {
            expected: message
                .message_type()
                .response_type()
                .unwrap_or(response_type),
            actual: response_type,
        })?;
        if !status.is_success() {
            return Err(PeerError::Status {
                message: response_type,
                status: status.code,
            });
        }
        Ok(())
    }

    fn dispatch(&self, message: Message) {
        let message_type = message.message_type();
        let message = {
            // Held until the response is handed over, so a requester that
            // times out either sees the slot still set or finds the response.
            let mut pending = lock(&self.pending);
            match pending.take() {
                Some(waiter) if waiter.expected == message_type => {
                    match waiter.tx.try_send(message) {
                        Ok(()) => return,
                        Err(TrySendError::Full(message) | TrySendError::Disconnected(message)) => {
                            tracing::warn!(
                                %message_type,
                                id = waiter.id,
                                "requester gone, treating response as notification"
                            );
                            message
                        }
                    }
                }
                other => {
                    *pending = other;
                    message
                }
            }
        };

        tracing::trace!(%message_type, "notification");
        match lock(&self.notify_tx).try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%message_type, "notification queue full, dropping");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn clear_pending(&self, id: u64) {
        let mut pending = lock(&self.pending);
        if pending.as_ref().is_some_and(|current| current.id == id) {
            *pending = None;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(PeerError::Disconnected("transport closed".to_string()));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use hubwire_frame::{pack, packetize};
    use hubwire_message::StatusResponse;

    use super::*;
    use crate::testing::{info_response, spawn_hub, FrameSink};

    #[test]
    fn request_matches_response_and_routes_notifications() {
        let (sink, frames) = FrameSink::new();
        let exchange = Arc::new(Exchange::new(FrameWriter::new(sink)));
        let notifications = exchange.subscribe().unwrap();
        let hub = spawn_hub(&exchange, frames, |request| match request {
            Message::InfoRequest => vec![
                Message::ConsoleNotification {
                    text: "booting".to_string(),
                },
                Message::InfoResponse(info_response(20)),
            ],
            _ => Vec::new(),
        });

        let response = exchange.request(&Message::InfoRequest).unwrap();
        assert_eq!(response, Message::InfoResponse(info_response(20)));
        assert_eq!(
            notifications.recv_timeout(Duration::from_secs(1)).unwrap(),
            Message::ConsoleNotification {
                text: "booting".to_string()
            }
        );
        assert_eq!(exchange.pending(), None);
        assert!(exchange.subscribe().is_none());

        drop(exchange);
        assert_eq!(hub.join().unwrap(), vec![Message::InfoRequest]);
    }

    #[test]
    fn negotiate_sets_packet_size() {
        let (sink, frames) = FrameSink::new();
        let exchange = Arc::new(Exchange::new(FrameWriter::new(sink)));
        let hub = spawn_hub(&exchange, frames, |request| match request {
            Message::InfoRequest => vec![Message::InfoResponse(info_response(20))],
            Message::ClearSlotRequest { .. } => {
                vec![Message::ClearSlotResponse(StatusResponse::SUCCESS)]
            }
            _ => Vec::new(),
        });

        let info = exchange.negotiate().unwrap();
        assert_eq!(info.max_packet_size, 20);
        assert_eq!(exchange.info(), Some(info));
        assert_eq!(lock(&exchange.writer).config().max_packet_size, Some(20));

        assert!(exchange.clear_slot(1).unwrap());
        drop(exchange);
        hub.join().unwrap();
    }

    #[test]
    fn timeout_clears_pending_and_late_response_becomes_notification() {
        let (sink, _frames) = FrameSink::new();
        let exchange = Exchange::new(FrameWriter::new(sink));
        let notifications = exchange.subscribe().unwrap();

        let err = exchange
            .request_with_timeout(&Message::InfoRequest, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, PeerError::Timeout(_)));
        assert_eq!(exchange.pending(), None);

        let late = Message::InfoResponse(info_response(20));
        assert!(exchange.receive(&pack(&late.encode())).is_empty());
        assert_eq!(notifications.try_recv().unwrap(), late);
    }

    #[test]
    fn response_for_departed_requester_becomes_notification() {
        let (sink, _frames) = FrameSink::new();
        let exchange = Exchange::new(FrameWriter::new(sink));
        let notifications = exchange.subscribe().unwrap();

        let (tx, rx) = mpsc::sync_channel(1);
        drop(rx);
        *lock(&exchange.pending) = Some(Pending {
            id: 7,
            expected: MessageType::InfoResponse,
            tx,
        });

        let response = Message::InfoResponse(info_response(20));
        assert!(exchange.receive(&pack(&response.encode())).is_empty());
        assert_eq!(exchange.pending(), None);
        assert_eq!(notifications.try_recv().unwrap(), response);
    }

    #[test]
    fn unrelated_message_leaves_pending_in_place() {
        let (sink, _frames) = FrameSink::new();
        let exchange = Exchange::new(FrameWriter::new(sink));
        let notifications = exchange.subscribe().unwrap();

        let (tx, rx) = mpsc::sync_channel(1);
        *lock(&exchange.pending) = Some(Pending {
            id: 1,
            expected: MessageType::InfoResponse,
            tx,
        });

        let console = Message::ConsoleNotification {
            text: "hi".to_string(),
        };
        exchange.receive(&pack(&console.encode()));
        assert_eq!(exchange.pending(), Some(MessageType::InfoResponse));
        assert_eq!(notifications.try_recv().unwrap(), console);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_and_typed_helpers_write_expected_requests() {
        let (sink, frames) = FrameSink::new();
        let exchange = Arc::new(Exchange::new(FrameWriter::new(sink)));
        let notifications = exchange.subscribe().unwrap();
        let ok = StatusResponse::SUCCESS;
        let hub = spawn_hub(&exchange, frames, move |request| match request {
            Message::InfoRequest => vec![Message::InfoResponse(info_response(20))],
            Message::DeviceNotificationRequest { .. } => {
                vec![Message::DeviceNotificationResponse(ok)]
            }
            Message::ProgramFlowRequest { .. } => vec![Message::ProgramFlowResponse(ok)],
            _ => Vec::new(),
        });

        exchange.send(&Message::InfoRequest).unwrap();
        assert_eq!(
            notifications.recv_timeout(Duration::from_secs(1)).unwrap(),
            Message::InfoResponse(info_response(20))
        );
        exchange.enable_device_notifications(100).unwrap();
        exchange.stop_program(2).unwrap();

        drop(exchange);
        assert_eq!(
            hub.join().unwrap(),
            vec![
                Message::InfoRequest,
                Message::DeviceNotificationRequest { interval_ms: 100 },
                Message::ProgramFlowRequest {
                    stop: true,
                    slot: 2
                },
            ]
        );
    }

    #[test]
    fn second_request_while_pending_is_busy() {
        let (sink, frames) = FrameSink::new();
        let exchange = Arc::new(Exchange::new(FrameWriter::new(sink)));

        let waiter = {
            let exchange = Arc::clone(&exchange);
            thread::spawn(move || {
                exchange.request_with_timeout(&Message::InfoRequest, Duration::from_secs(5))
            })
        };
        frames.recv_timeout(Duration::from_secs(1)).unwrap();

        let err = exchange
            .request(&Message::ClearSlotRequest { slot: 0 })
            .unwrap_err();
        assert!(matches!(
            err,
            PeerError::Busy {
                expected: MessageType::InfoResponse
            }
        ));

        assert!(exchange.cancel());
        assert!(matches!(waiter.join().unwrap(), Err(PeerError::Cancelled)));
        assert!(!exchange.cancel());
    }

    #[test]
    fn fragmented_response_is_reassembled() {
        let (sink, frames) = FrameSink::new();
        let exchange = Arc::new(Exchange::new(FrameWriter::new(sink)));

        let feeder = {
            let exchange = Arc::clone(&exchange);
            thread::spawn(move || {
                frames.recv_timeout(Duration::from_secs(1)).unwrap();
                let frame = pack(&Message::InfoResponse(info_response(20)).encode());
                for packet in packetize(&frame, Some(3)) {
                    assert!(exchange.receive(packet).is_empty());
                }
            })
        };

        let response = exchange.request(&Message::InfoRequest).unwrap();
        assert!(matches!(response, Message::InfoResponse(_)));
        feeder.join().unwrap();
    }

    #[test]
    fn malformed_frames_are_reported_not_fatal() {
        let (sink, _frames) = FrameSink::new();
        let exchange = Exchange::new(FrameWriter::new(sink));
        let notifications = exchange.subscribe().unwrap();

        let faults = exchange.receive(&[0x03, 0x02]);
        assert_eq!(faults.len(), 1);
        assert!(faults[0].is_recoverable());

        let faults = exchange.receive(&pack(&[0xEE]));
        assert!(matches!(faults[..], [PeerError::Message(_)]));

        exchange.receive(&pack(&Message::ProgramFlowNotification { stop: true }.encode()));
        assert_eq!(
            notifications.try_recv().unwrap(),
            Message::ProgramFlowNotification { stop: true }
        );
    }

    #[test]
    fn failure_status_is_an_error_except_for_clear_slot() {
        let (sink, frames) = FrameSink::new();
        let exchange = Arc::new(Exchange::new(FrameWriter::new(sink)));
        let hub = spawn_hub(&exchange, frames, |request| match request {
            Message::ClearSlotRequest { .. } => {
                vec![Message::ClearSlotResponse(StatusResponse::failure(1))]
            }
            Message::ProgramFlowRequest { .. } => {
                vec![Message::ProgramFlowResponse(StatusResponse::failure(2))]
            }
            _ => Vec::new(),
        });

        assert!(!exchange.clear_slot(3).unwrap());
        assert!(matches!(
            exchange.start_program(3),
            Err(PeerError::Status {
                message: MessageType::ProgramFlowResponse,
                status: 2
            })
        ));
        drop(exchange);
        hub.join().unwrap();
    }

    #[test]
    fn non_requests_are_rejected() {
        let (sink, _frames) = FrameSink::new();
        let exchange = Exchange::new(FrameWriter::new(sink));
        let err = exchange
            .request(&Message::ConsoleNotification {
                text: String::new(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            PeerError::NotARequest(MessageType::ConsoleNotification)
        ));
    }

    #[test]
    fn pump_dispatches_until_close() {
        let mut wire = Vec::new();
        wire.extend(pack(&Message::ConsoleNotification { text: "a".into() }.encode()));
        wire.extend([0x03, 0x02]);
        wire.extend(pack(&Message::ProgramFlowNotification { stop: false }.encode()));

        let (sink, _frames) = FrameSink::new();
        let exchange = Exchange::new(FrameWriter::new(sink));
        let notifications = exchange.subscribe().unwrap();

        let mut reader = FrameReader::new(std::io::Cursor::new(wire));
        exchange.pump(&mut reader).unwrap();

        let received: Vec<Message> = notifications.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert!(exchange.is_closed());
        assert!(matches!(
            exchange.request(&Message::InfoRequest),
            Err(PeerError::Disconnected(_))
        ));
    }
}
