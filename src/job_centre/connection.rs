//! Per-client connection handling: one JSON request per line in, one JSON
//! response per line out, and implicit abort of any held jobs on
//! disconnect.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::job_centre::broker::{Broker, HolderId};
use crate::job_centre::protocol::{self, Request, Response};

/// Handles one client connection until it disconnects, then releases any
/// jobs it was still holding back to their queues.
#[instrument(skip(broker, socket), fields(holder = holder))]
pub async fn handle_connection(broker: Arc<Broker>, socket: TcpStream, holder: HolderId) {
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut held: Option<u64> = None;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "connection read error");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = match protocol::parse_request(&line) {
            Some(request) => dispatch(&broker, request, holder, &mut held).await,
            None => Response::Error,
        };

        if write_half.write_all(response.to_line().as_bytes()).await.is_err() {
            break;
        }
    }

    broker.release_holder(holder);
}

async fn dispatch(broker: &Broker, request: Request, holder: HolderId, held: &mut Option<u64>) -> Response {
    match request {
        Request::Put { queue, job, pri } => {
            let id = broker.put(queue, job, pri);
            Response::PutOk { id }
        }
        Request::Get { queues, wait } => match broker.get(&queues, wait, holder).await {
            Some(job) => {
                // A connection holds at most one job: picking up a new one
                // silently completes whatever it was holding before.
                if let Some(previous) = held.replace(job.id) {
                    broker.mark_done_if_held_by(previous, holder);
                }
                Response::GetOk { id: job.id, job: job.job, pri: job.pri, queue: job.queue }
            }
            None => Response::NoJob,
        },
        Request::Delete { id } => {
            if broker.delete(id) {
                if *held == Some(id) {
                    *held = None;
                }
                Response::Ok
            } else {
                Response::NoJob
            }
        }
        Request::Abort { id } => {
            if Some(id) == *held && broker.abort(id, holder) {
                *held = None;
                Response::Ok
            } else {
                Response::NoJob
            }
        }
    }
}
