//! Speed Daemon: average-speed traffic enforcement over a binary TCP
//! protocol.
//!
//! Cameras report plate sightings; dispatchers receive tickets for the
//! roads they cover. A plate is ticketed once per calendar day across all
//! roads it's seen on, for the highest-speed offending pair of sightings on
//! any single road.

pub mod car;
pub mod connection;
pub mod protocol;
pub mod state;

use crate::dispatcher::{self, DispatcherConfig};
use crate::Result;
use state::Daemon;

/// Binds a threaded-mode listener and serves Speed Daemon on it.
///
/// Threaded mode is the right fit here: each connection is long-lived (a
/// camera or dispatcher stays connected indefinitely) and does nothing but
/// wait on I/O between messages, so bounding worker count doesn't bound
/// useful throughput the way it would for a request/response service.
pub async fn run(config: DispatcherConfig) -> Result<()> {
    let daemon = Daemon::new();
    dispatcher::run_threaded(config, move |socket| {
        let daemon = daemon.clone();
        Box::pin(async move {
            connection::handle_connection(daemon, socket).await;
        })
    })
    .await
}
