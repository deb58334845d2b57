//! Shared daemon state: every plate's observation history, the live
//! dispatchers for each road, and tickets still waiting for a dispatcher.
//!
//! Modeled on the source's `Db`/`Shared` split: one `Arc`-shared handle
//! wrapping a `std::sync::Mutex`-guarded inner struct, because every
//! operation here is a short, synchronous map lookup with no `.await`
//! inside the critical section.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::speed_daemon::car::{Observation, PlateHistory};
use crate::speed_daemon::protocol::ServerMessage;

/// A ticket ready to be delivered to a dispatcher for `road`.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub plate: String,
    pub road: u16,
    pub mile1: u16,
    pub timestamp1: u32,
    pub mile2: u16,
    pub timestamp2: u32,
    pub speed_centi_mph: u16,
}

impl Ticket {
    fn into_message(self) -> ServerMessage {
        ServerMessage::Ticket {
            plate: self.plate,
            road: self.road,
            mile1: self.mile1,
            timestamp1: self.timestamp1,
            mile2: self.mile2,
            timestamp2: self.timestamp2,
            speed_centi_mph: self.speed_centi_mph,
        }
    }
}

#[derive(Default)]
struct Inner {
    plates: HashMap<String, PlateHistory>,
    dispatchers: HashMap<u16, Vec<UnboundedSender<ServerMessage>>>,
    pending: HashMap<u16, Vec<Ticket>>,
}

/// The shared handle passed to every connection task.
#[derive(Clone, Default)]
pub struct Daemon {
    inner: Arc<Mutex<Inner>>,
}

impl Daemon {
    pub fn new() -> Self {
        Daemon::default()
    }

    /// Registers a dispatcher's outbound channel for each road it covers,
    /// and immediately flushes any tickets that were queued while no
    /// dispatcher was available for those roads.
    pub fn register_dispatcher(&self, roads: &[u16], tx: UnboundedSender<ServerMessage>) {
        let mut inner = self.inner.lock().unwrap();
        for &road in roads {
            inner.dispatchers.entry(road).or_default().push(tx.clone());
            if let Some(queued) = inner.pending.remove(&road) {
                for ticket in queued {
                    debug!(road, plate = %ticket.plate, "flushing queued ticket to new dispatcher");
                    let _ = tx.send(ticket.into_message());
                }
            }
        }
    }

    /// Removes `tx` from every road's dispatcher list. Called when a
    /// dispatcher connection closes so a dead sender isn't picked for
    /// future deliveries.
    pub fn unregister_dispatcher(&self, roads: &[u16], tx: &UnboundedSender<ServerMessage>) {
        let mut inner = self.inner.lock().unwrap();
        for road in roads {
            if let Some(list) = inner.dispatchers.get_mut(road) {
                list.retain(|existing| !existing.same_channel(tx));
            }
        }
    }

    /// Records a camera's sighting of `plate` and, if it forms a ticketable
    /// pair not already covered by an earlier ticket, delivers it to a live
    /// dispatcher for the road or queues it until one registers.
    pub fn record_observation(
        &self,
        plate: String,
        road: u16,
        limit_mph: u16,
        mile: u16,
        timestamp: u32,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let history = inner.plates.entry(plate.clone()).or_default();
        let candidate = history.record_observation(road, limit_mph, Observation { mile, timestamp });

        let Some(candidate) = candidate else { return };
        if !history.try_claim(&candidate) {
            debug!(%plate, road, "suppressing ticket, day already covered");
            return;
        }

        let ticket = Ticket {
            plate,
            road: candidate.road,
            mile1: candidate.mile1,
            timestamp1: candidate.timestamp1,
            mile2: candidate.mile2,
            timestamp2: candidate.timestamp2,
            speed_centi_mph: candidate.speed_centi_mph,
        };

        match inner.dispatchers.get(&road).and_then(|list| list.first()) {
            Some(tx) => {
                let _ = tx.send(ticket.into_message());
            }
            None => {
                inner.pending.entry(road).or_default().push(ticket);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn ticket_queues_until_a_dispatcher_registers() {
        let daemon = Daemon::new();
        daemon.record_observation("UN1X".into(), 1, 60, 0, 0);
        daemon.record_observation("UN1X".into(), 1, 60, 1, 50);

        let (tx, mut rx) = mpsc::unbounded_channel();
        daemon.register_dispatcher(&[1], tx);

        let msg = rx.try_recv().expect("queued ticket should be flushed on registration");
        assert!(matches!(msg, ServerMessage::Ticket { .. }));
    }

    #[test]
    fn ticket_delivered_immediately_when_dispatcher_present() {
        let daemon = Daemon::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        daemon.register_dispatcher(&[1], tx);

        daemon.record_observation("UN1X".into(), 1, 60, 0, 0);
        daemon.record_observation("UN1X".into(), 1, 60, 1, 50);

        let msg = rx.try_recv().expect("ticket should be delivered immediately");
        assert!(matches!(msg, ServerMessage::Ticket { .. }));
    }
}
