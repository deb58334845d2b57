//! The job broker: named priority queues, monotonic job IDs, and ownership
//! tracking for in-progress jobs.
//!
//! Queues are max-heaps ordered by priority (ties broken toward the
//! earlier-submitted job). Deletion and abort don't touch the heap directly
//! — a job's authoritative state lives in `states`, and [`Broker::try_get`]
//! lazily discards stale heap entries it finds in any state other than
//! `Queued`. This keeps `put`/`delete`/`abort` O(log n) without needing a
//! heap that supports arbitrary removal.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::Notify;

/// Identifies the connection currently holding an in-progress job, so an
/// `abort` can be rejected if it doesn't come from the holder, and so a
/// disconnecting connection's jobs can be found and requeued.
pub type HolderId = u64;

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: u64,
    pub queue: String,
    pub pri: i64,
    pub job: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Queued,
    InProgress(HolderId),
    /// Terminal: either explicitly deleted, or implicitly completed because
    /// its holder moved on to another job or disconnected. The protocol
    /// doesn't distinguish the two once a job reaches this state.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueuedJob {
    pri: i64,
    // Reversed so the BinaryHeap (a max-heap) pops the *smaller* id first
    // among equal priorities, giving FIFO behavior for ties.
    id_rev: std::cmp::Reverse<u64>,
}

impl QueuedJob {
    fn new(pri: i64, id: u64) -> Self {
        QueuedJob { pri, id_rev: std::cmp::Reverse(id) }
    }

    fn id(&self) -> u64 {
        self.id_rev.0
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pri.cmp(&other.pri).then_with(|| self.id_rev.cmp(&other.id_rev))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    jobs: HashMap<u64, JobRecord>,
    states: HashMap<u64, JobState>,
    queues: HashMap<String, BinaryHeap<QueuedJob>>,
}

/// Shared broker state, handed to every connection task.
pub struct Broker {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Broker {
    pub fn new() -> Arc<Self> {
        Arc::new(Broker { inner: Mutex::new(Inner::default()), notify: Notify::new() })
    }

    pub fn put(&self, queue: String, job: Value, pri: i64) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.jobs.insert(id, JobRecord { id, queue: queue.clone(), pri, job });
        inner.states.insert(id, JobState::Queued);
        inner.queues.entry(queue).or_default().push(QueuedJob::new(pri, id));
        drop(inner);
        self.notify.notify_waiters();
        id
    }

    /// A single, non-blocking attempt to pull the highest-priority job
    /// across `queues`. Discards any stale (deleted or already-claimed)
    /// heap entries it encounters along the way.
    ///
    /// Ties in priority are broken by the order `queues` names them in, not
    /// by job id: the first queue in the request's list wins, so this scans
    /// `queues` in order and only switches to a later queue on a strictly
    /// higher priority.
    fn try_get(&self, queues: &[String], holder: HolderId) -> Option<JobRecord> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            let mut best: Option<(&String, i64)> = None;
            for q in queues {
                if let Some(top) = inner.queues.get(q).and_then(|h| h.peek()) {
                    if best.map(|(_, pri)| top.pri > pri).unwrap_or(true) {
                        best = Some((q, top.pri));
                    }
                }
            }
            let best_queue = best.map(|(q, _)| q.clone())?;

            let top = inner.queues.get_mut(&best_queue).unwrap().pop().unwrap();
            match inner.states.get(&top.id()).copied() {
                Some(JobState::Queued) => {
                    inner.states.insert(top.id(), JobState::InProgress(holder));
                    return inner.jobs.get(&top.id()).cloned();
                }
                _ => continue,
            }
        }
    }

    /// Pulls the highest-priority job across `queues`, blocking until one is
    /// available if `wait` is set and none is available immediately.
    pub async fn get(&self, queues: &[String], wait: bool, holder: HolderId) -> Option<JobRecord> {
        loop {
            // Registered before the check so a `put`/`abort` landing between
            // the failed `try_get` and this future's `.await` isn't missed:
            // `Notify` guarantees a notification sent after a `notified()`
            // future is created (even unpolled) is observed by that future.
            let notified = self.notify.notified();
            if let Some(job) = self.try_get(queues, holder) {
                return Some(job);
            }
            if !wait {
                return None;
            }
            notified.await;
        }
    }

    /// Marks `id` Done if `holder` currently holds it; a no-op otherwise.
    /// Called when a connection's next successful `get` implicitly
    /// completes the job it was previously holding.
    pub fn mark_done_if_held_by(&self, id: u64, holder: HolderId) {
        let mut inner = self.inner.lock().unwrap();
        if inner.states.get(&id).copied() == Some(JobState::InProgress(holder)) {
            inner.states.insert(id, JobState::Done);
        }
    }

    /// Marks `id` Done regardless of whether it's queued or in progress.
    /// Returns `false` if `id` doesn't exist or was already Done.
    pub fn delete(&self, id: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.states.get(&id).copied() {
            Some(JobState::Queued) | Some(JobState::InProgress(_)) => {
                inner.states.insert(id, JobState::Done);
                true
            }
            _ => false,
        }
    }

    /// Returns an in-progress job held by `holder` to its queue. Returns
    /// `false` if `id` isn't in progress, or is held by someone else.
    pub fn abort(&self, id: u64, holder: HolderId) -> bool {
        self.requeue_if_held_by(id, holder)
    }

    fn requeue_if_held_by(&self, id: u64, holder: HolderId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.states.get(&id).copied() {
            Some(JobState::InProgress(h)) if h == holder => {
                let record = inner.jobs.get(&id).expect("in-progress job must exist").clone();
                inner.states.insert(id, JobState::Queued);
                inner.queues.entry(record.queue).or_default().push(QueuedJob::new(record.pri, id));
                drop(inner);
                self.notify.notify_waiters();
                true
            }
            _ => false,
        }
    }

    /// Requeues every job currently held by `holder`. Called when a
    /// connection disconnects while holding jobs — the protocol's implicit
    /// abort-on-disconnect.
    pub fn release_holder(&self, holder: HolderId) {
        let held: Vec<u64> = {
            let inner = self.inner.lock().unwrap();
            inner
                .states
                .iter()
                .filter_map(|(id, state)| match state {
                    JobState::InProgress(h) if *h == holder => Some(*id),
                    _ => None,
                })
                .collect()
        };
        for id in held {
            self.requeue_if_held_by(id, holder);
        }
    }
}
