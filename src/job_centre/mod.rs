//! Job Centre: a priority job queue broker speaking newline-delimited JSON.

pub mod broker;
pub mod connection;
pub mod protocol;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::dispatcher::{self, DispatcherConfig};
use crate::Result;
use broker::Broker;

/// Binds a threaded-mode listener and serves Job Centre on it.
///
/// Threaded mode suits this service the same way it suits Speed Daemon:
/// connections are long-lived and spend most of their time blocked on
/// `get wait:true` or idle between requests, so the worker count bounds
/// nothing that matters for correctness.
pub async fn run(config: DispatcherConfig) -> Result<()> {
    let broker = Broker::new();
    let next_holder = Arc::new(AtomicU64::new(1));

    dispatcher::run_threaded(config, move |socket| {
        let broker = Arc::clone(&broker);
        let holder = next_holder.fetch_add(1, Ordering::Relaxed);
        Box::pin(async move {
            connection::handle_connection(broker, socket, holder).await;
        })
    })
    .await
}
