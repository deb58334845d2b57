//! Line Reversal Control Protocol: a reliable byte stream over UDP,
//! layered under a line-reversal application.
//!
//! The protocol itself (session lifecycle, retransmission, in-order
//! delivery) lives in [`codec`], [`session`], and [`engine`]; [`app`]
//! exposes the byte-stream interface an application runs against, and
//! provides the reference line-reversal application this crate ships.

pub mod app;
pub mod codec;
pub mod engine;
pub mod session;

use std::sync::Arc;

use crate::dispatcher::{self, DatagramEvent, DispatcherConfig};
use crate::Result;
use engine::Engine;

/// Binds a datagram-mode listener and serves LRCP-over-UDP on it, running
/// the line-reversal application on every new session.
pub async fn run(config: DispatcherConfig) -> Result<()> {
    let engine = Engine::new();
    dispatcher::run_datagram(config, move |event: DatagramEvent| {
        let engine = Arc::clone(&engine);
        Box::pin(async move {
            let DatagramEvent { peer, data, socket } = event;
            engine.handle_datagram(socket, peer, &data, |stream| {
                tokio::spawn(app::run_line_reversal(stream));
            });
        })
    })
    .await
}
