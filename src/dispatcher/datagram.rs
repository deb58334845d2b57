//! A single receive loop over one UDP socket.
//!
//! UDP has no connection state to multiplex over, so this mode is the
//! simplest of the three: read a datagram, hand it and its source address to
//! the handler, await it, read the next one. The handler is responsible for
//! any session bookkeeping (LRCP keys sessions by source address).

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, error, instrument};

use crate::dispatcher::DispatcherConfig;
use crate::Result;

/// One received datagram, handed to the handler together with a socket it
/// can use to reply.
pub struct DatagramEvent {
    pub peer: SocketAddr,
    pub data: Vec<u8>,
    pub socket: Arc<UdpSocket>,
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A datagram handler invoked once per received packet.
pub trait DatagramHandler: Fn(DatagramEvent) -> BoxFuture + Send + Sync {}
impl<T> DatagramHandler for T where T: Fn(DatagramEvent) -> BoxFuture + Send + Sync {}

const MAX_DATAGRAM: usize = 65_527;

/// Binds `config.port` as a UDP socket and loops: receive a datagram, spawn
/// the handler for it, receive the next one immediately (datagram handling
/// is not serialized the way threaded-mode connection handling is, since
/// there is no per-client ordering guarantee to preserve at this layer —
/// ordering, where it matters, is the handler's job, as it is for LRCP).
#[instrument(skip(handler))]
pub async fn run_datagram(
    config: DispatcherConfig,
    handler: impl DatagramHandler + 'static,
) -> Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", config.port))
        .await
        .map_err(|e| -> crate::Error { format!("failed to bind datagram socket on port {}: {e}", config.port).into() })?;
    let socket = Arc::new(socket);
    let handler = Arc::new(handler);

    tracing::info!(port = config.port, "datagram dispatcher started");

    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((n, peer)) => {
                    debug!(%peer, bytes = n, "received datagram");
                    let event = DatagramEvent {
                        peer,
                        data: buf[..n].to_vec(),
                        socket: Arc::clone(&socket),
                    };
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        handler(event).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "datagram recv failed");
                }
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn delivers_each_datagram_with_its_peer_address() {
        let received = Arc::new(AtomicUsize::new(0));
        let received_h = Arc::clone(&received);

        let listener = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = DispatcherConfig { port: addr.port(), ..Default::default() };

        run_datagram(config, move |event: DatagramEvent| {
            let received = Arc::clone(&received_h);
            Box::pin(async move {
                received.fetch_add(1, Ordering::SeqCst);
                let _ = event.socket.send_to(&event.data, event.peer).await;
            })
        })
        .await
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        client.connect(addr).await.unwrap();
        client.send(b"ping").await.unwrap();

        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(std::time::Duration::from_secs(1), client.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }
}
