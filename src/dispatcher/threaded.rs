//! Pre-forked worker pool over blocking accept, translated to Tokio tasks.
//!
//! Each worker task owns the listening socket (shared via a cheap handle,
//! since `TcpListener::accept` takes `&self`) and loops: accept a
//! connection, hand it to the caller's handler, and `.await` the handler to
//! completion before looping back to accept the next one. That await is the
//! translation of "blocking accept, blocking handle" from the pre-fork
//! model: a worker cannot pick up a second connection while busy with its
//! first, so at most `threads` connections are served concurrently.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, instrument};

use crate::dispatcher::DispatcherConfig;
use crate::Result;

/// A per-connection handler invoked by [`run_threaded`].
///
/// Boxed so callers can pass ordinary `async fn`/closures without the
/// dispatcher needing to be generic over the future type.
pub trait ThreadedHandler: Fn(TcpStream) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync {}

impl<T> ThreadedHandler for T where
    T: Fn(TcpStream) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync
{
}

/// Binds `config.port`, listens with `config.backlog`, and spawns
/// `config.threads` acceptor tasks that each call `handler` to completion
/// for one connection at a time.
///
/// Returns once the listener is bound and all workers are spawned; the
/// workers themselves run until the process exits (no graceful shutdown —
/// see the crate-level non-goals).
#[instrument(skip(handler))]
pub async fn run_threaded(
    config: DispatcherConfig,
    handler: impl ThreadedHandler + 'static,
) -> Result<()> {
    let listener = bind(&config).await?;
    let listener = Arc::new(listener);
    let handler = Arc::new(handler);

    for worker_id in 0..config.threads.max(1) {
        let listener = Arc::clone(&listener);
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            worker_loop(worker_id, listener, handler).await;
        });
    }

    info!(port = config.port, threads = config.threads, "threaded dispatcher started");
    Ok(())
}

async fn bind(config: &DispatcherConfig) -> Result<TcpListener> {
    let addr = ("0.0.0.0", config.port);
    let listener = TcpListener::bind(addr).await.map_err(|e| -> crate::Error {
        format!("failed to bind threaded listener on port {}: {e}", config.port).into()
    })?;
    Ok(listener)
}

async fn worker_loop(
    worker_id: usize,
    listener: Arc<TcpListener>,
    handler: Arc<impl ThreadedHandler + 'static>,
) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                tracing::debug!(worker_id, %peer, "accepted connection");
                handler(socket).await;
            }
            Err(e) => {
                error!(worker_id, error = %e, "accept failed, pausing briefly");
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}
