//! Per-connection role state machine: a socket starts unidentified, becomes
//! either a camera or a dispatcher on its first identifying message, and
//! stays that for the life of the connection. Heartbeats, once requested,
//! run independently of whichever role the connection ends up in.

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::speed_daemon::protocol::{self, ClientMessage, ServerMessage};
use crate::speed_daemon::state::Daemon;

enum Role {
    Camera { road: u16, mile: u16, limit: u16 },
    Dispatcher { roads: Vec<u16> },
}

/// Handles one Speed Daemon client connection end to end. Returns once the
/// connection closes or a protocol violation forces it shut.
#[instrument(skip(daemon, socket), fields(peer = %socket.peer_addr().map(|a| a.to_string()).unwrap_or_default()))]
pub async fn handle_connection(daemon: Daemon, socket: TcpStream) {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut role: Option<Role> = None;
    let mut heartbeat_requested = false;

    loop {
        tokio::select! {
            msg = protocol::read_message(&mut reader) => {
                match msg {
                    Ok(ClientMessage::WantHeartbeat { interval }) => {
                        if heartbeat_requested {
                            send_error(&mut write_half, "heartbeat already requested").await;
                            break;
                        }
                        heartbeat_requested = true;
                        if interval > 0 {
                            spawn_heartbeat(out_tx.clone(), interval);
                        }
                    }
                    Ok(ClientMessage::IAmCamera { road, mile, limit }) => {
                        if role.is_some() {
                            send_error(&mut write_half, "already identified").await;
                            break;
                        }
                        debug!(road, mile, limit, "connection identified as camera");
                        role = Some(Role::Camera { road, mile, limit });
                    }
                    Ok(ClientMessage::IAmDispatcher { roads }) => {
                        if role.is_some() {
                            send_error(&mut write_half, "already identified").await;
                            break;
                        }
                        debug!(?roads, "connection identified as dispatcher");
                        daemon.register_dispatcher(&roads, out_tx.clone());
                        role = Some(Role::Dispatcher { roads });
                    }
                    Ok(ClientMessage::Plate { plate, timestamp }) => {
                        match &role {
                            Some(Role::Camera { road, mile, limit }) => {
                                daemon.record_observation(plate, *road, *limit, *mile, timestamp);
                            }
                            _ => {
                                send_error(&mut write_half, "plate reported by non-camera").await;
                                break;
                            }
                        }
                    }
                    Err(protocol::Error::Eof) => {
                        info!("connection closed");
                        break;
                    }
                    Err(protocol::Error::Malformed(message)) => {
                        send_error(&mut write_half, &message).await;
                        break;
                    }
                }
            }
            Some(message) = out_rx.recv() => {
                if protocol::write_message(&mut write_half, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(Role::Dispatcher { roads }) = role {
        daemon.unregister_dispatcher(&roads, &out_tx);
    }
}

async fn send_error<W: AsyncWriteExt + Unpin>(writer: &mut W, message: &str) {
    let _ = protocol::write_message(writer, &ServerMessage::Error { message: message.into() }).await;
}

fn spawn_heartbeat(tx: mpsc::UnboundedSender<ServerMessage>, interval_deciseconds: u32) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_deciseconds as u64 * 100));
        loop {
            ticker.tick().await;
            if tx.send(ServerMessage::Heartbeat).is_err() {
                break;
            }
        }
    });
}
