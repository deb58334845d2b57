//! The session table: demultiplexes incoming datagrams by session ID,
//! spawning a new session actor on the first `/connect/` for an unseen ID
//! and routing everything else to the existing actor.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::lrcp::app::AppStream;
use crate::lrcp::codec::{self, Message};
use crate::lrcp::session::{self, SessionEvent};

/// Shared across every datagram received on the LRCP socket.
pub struct Engine {
    sessions: Mutex<HashMap<u32, tokio::sync::mpsc::UnboundedSender<SessionEvent>>>,
}

impl Engine {
    pub fn new() -> Arc<Self> {
        Arc::new(Engine { sessions: Mutex::new(HashMap::new()) })
    }

    /// Decodes `payload` and routes it to the addressed session, spawning a
    /// new session actor if this is the first packet seen for that ID.
    ///
    /// `spawn_app` builds the application task for a brand new session; it's
    /// ignored for packets addressed to an existing session.
    pub fn handle_datagram(
        self: &Arc<Self>,
        socket: Arc<UdpSocket>,
        peer: SocketAddr,
        payload: &[u8],
        spawn_app: impl FnOnce(AppStream) + Send + 'static,
    ) {
        let message = match codec::decode(payload) {
            Ok(m) => m,
            Err(e) => {
                debug!(%peer, error = %e, "dropping malformed LRCP packet");
                return;
            }
        };

        let id = message.session_id();
        let mut sessions = self.sessions.lock().unwrap();

        let is_new = !sessions.contains_key(&id);
        if is_new && !matches!(message, Message::Connect { .. }) {
            // Per the protocol, any packet for an unknown session other than
            // `connect` gets a `close` back and is otherwise ignored.
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                let _ = socket.send_to(&codec::encode(&Message::Close { session: id }), peer).await;
            });
            return;
        }

        let tx = sessions.entry(id).or_insert_with(|| {
            let engine = Arc::clone(self);
            session::spawn(id, peer, socket, spawn_app, move || {
                engine.sessions.lock().unwrap().remove(&id);
            })
        });

        let event = match message {
            Message::Connect { .. } => SessionEvent::Connect,
            Message::Data { pos, data, .. } => SessionEvent::Data { pos, data },
            Message::Ack { length, .. } => SessionEvent::Ack { length },
            Message::Close { .. } => SessionEvent::Close,
        };
        let _ = tx.send(event);
    }
}
