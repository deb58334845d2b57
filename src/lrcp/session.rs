//! One LRCP session's state machine, running as its own task.
//!
//! Each session owns its receive position, its unacknowledged send buffer,
//! and a retransmission timer; all of it lives behind a single task rather
//! than a shared lock, so the per-session logic below can stay ordinary
//! sequential code.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::lrcp::app::{AppStream, OUTGOING_SOFT_CAP};
use crate::lrcp::codec::{self, Message};

/// Events fed to a session actor, decoded from datagrams addressed to it.
#[derive(Debug)]
pub enum SessionEvent {
    Connect,
    Data { pos: u32, data: Vec<u8> },
    Ack { length: u32 },
    Close,
}

const RETRANSMIT_INTERVAL: Duration = Duration::from_millis(1500);
const EXPIRY_TIMEOUT: Duration = Duration::from_secs(60);
/// Conservative cap on a single outgoing `/data/` payload before escaping;
/// keeps every packet this session emits well under common UDP MTUs even
/// after backslash-escaping doubles the worst case.
const MAX_CHUNK: usize = 900;

struct Session {
    id: u32,
    peer: SocketAddr,
    socket: Arc<UdpSocket>,
    recv_next: u32,
    send_acked: u32,
    send_buf: Vec<u8>,
    last_activity: Instant,
    last_retransmit: Instant,
    incoming_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Session {
    async fn send(&self, message: &Message) {
        let bytes = codec::encode(message);
        if let Err(e) = self.socket.send_to(&bytes, self.peer).await {
            warn!(session = self.id, error = %e, "failed to send LRCP packet");
        }
    }

    async fn send_ack(&self) {
        self.send(&Message::Ack { session: self.id, length: self.recv_next }).await;
    }

    async fn on_connect(&mut self) {
        self.last_activity = Instant::now();
        self.send_ack().await;
    }

    async fn on_data(&mut self, pos: u32, data: Vec<u8>) {
        self.last_activity = Instant::now();

        if pos > self.recv_next {
            // Out-of-order: we never buffer ahead of `recv_next`, so the
            // sender needs to retransmit from where we actually are.
            self.send_ack().await;
            return;
        }

        let overlap = (self.recv_next - pos) as usize;
        if overlap >= data.len() {
            // Fully a retransmission of bytes we already have.
            self.send_ack().await;
            return;
        }

        let fresh = &data[overlap..];
        self.recv_next += fresh.len() as u32;
        let _ = self.incoming_tx.send(fresh.to_vec());
        self.send_ack().await;
    }

    async fn on_ack(&mut self, length: u32) -> bool {
        self.last_activity = Instant::now();

        if length <= self.send_acked {
            return false;
        }
        let sent_so_far = self.send_acked as usize + self.send_buf.len();
        if length as usize > sent_so_far {
            warn!(session = self.id, length, "peer acked data never sent, closing");
            return true;
        }
        let advance = (length - self.send_acked) as usize;
        self.send_buf.drain(0..advance);
        self.send_acked = length;
        false
    }

    async fn queue_outgoing(&mut self, chunk: &[u8]) {
        self.send_buf.extend_from_slice(chunk);
        self.flush_unacked().await;
        self.last_retransmit = Instant::now();
    }

    async fn flush_unacked(&self) {
        for (offset, window) in self.send_buf.chunks(MAX_CHUNK).enumerate() {
            let pos = self.send_acked + (offset * MAX_CHUNK) as u32;
            self.send(&Message::Data { session: self.id, pos, data: window.to_vec() }).await;
        }
    }

    async fn retransmit_if_due(&mut self) {
        if self.send_buf.is_empty() {
            return;
        }
        if self.last_retransmit.elapsed() < RETRANSMIT_INTERVAL {
            return;
        }
        debug!(session = self.id, unacked = self.send_buf.len(), "retransmitting");
        self.flush_unacked().await;
        self.last_retransmit = Instant::now();
    }

    fn expired(&self) -> bool {
        self.last_activity.elapsed() > EXPIRY_TIMEOUT
    }
}

/// Spawns the actor task for one session and returns the channel used to
/// feed it decoded events. `on_exit` is called once the task ends, so the
/// caller (the session table) can stop routing datagrams to it.
pub fn spawn(
    id: u32,
    peer: SocketAddr,
    socket: Arc<UdpSocket>,
    spawn_app: impl FnOnce(AppStream) + Send + 'static,
    on_exit: impl FnOnce() + Send + 'static,
) -> mpsc::UnboundedSender<SessionEvent> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<u8>(OUTGOING_SOFT_CAP);

    spawn_app(AppStream::new(incoming_rx, outgoing_tx));

    tokio::spawn(async move {
        let mut session = Session {
            id,
            peer,
            socket,
            recv_next: 0,
            send_acked: 0,
            send_buf: Vec::new(),
            last_activity: Instant::now(),
            last_retransmit: Instant::now(),
            incoming_tx,
        };

        let mut retransmit_ticker = tokio::time::interval(Duration::from_millis(200));
        let mut expiry_ticker = tokio::time::interval(Duration::from_secs(5));

        'outer: loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(SessionEvent::Connect) => session.on_connect().await,
                        Some(SessionEvent::Data { pos, data }) => session.on_data(pos, data).await,
                        Some(SessionEvent::Ack { length }) => {
                            if session.on_ack(length).await {
                                session.send(&Message::Close { session: id }).await;
                                break 'outer;
                            }
                        }
                        Some(SessionEvent::Close) => {
                            session.send(&Message::Close { session: id }).await;
                            break 'outer;
                        }
                        None => break 'outer,
                    }
                }
                maybe_byte = outgoing_rx.recv() => {
                    match maybe_byte {
                        Some(byte) => {
                            let mut chunk = vec![byte];
                            while let Ok(b) = outgoing_rx.try_recv() {
                                chunk.push(b);
                                if chunk.len() >= MAX_CHUNK {
                                    break;
                                }
                            }
                            session.queue_outgoing(&chunk).await;
                        }
                        None => {
                            // Application task finished; nothing more to send,
                            // but we keep serving acks/retransmits until the
                            // peer closes or the session expires.
                        }
                    }
                }
                _ = retransmit_ticker.tick() => {
                    session.retransmit_if_due().await;
                }
                _ = expiry_ticker.tick() => {
                    if session.expired() {
                        debug!(session = id, "session expired");
                        session.send(&Message::Close { session: id }).await;
                        break 'outer;
                    }
                }
            }
        }

        on_exit();
    });

    event_tx
}
