//! The shared server framework: one configuration surface, three
//! interchangeable I/O dispatch loops.
//!
//! - [`run_threaded`] spawns a fixed pool of acceptor tasks, each fully
//!   blocking-accept style: handle one connection to completion, then accept
//!   the next. Concurrency is bounded by the worker count.
//! - [`run_multiplexed`] runs a single readiness-multiplexed loop over a
//!   fixed-size connection table, the way a pre-`epoll` C server would.
//! - [`run_datagram`] runs a single receive loop over a UDP socket.
//!
//! Every challenge binary picks exactly one of these and supplies a handler;
//! the dispatcher owns the listening socket and the loop, and never touches
//! application state itself.

mod datagram;
mod multiplexed;
mod threaded;

pub use datagram::{run_datagram, DatagramEvent, DatagramHandler};
pub use multiplexed::{read_available, run_multiplexed, write_all_blocking, ConnTable, Connection, MultiplexedHandler};
pub use threaded::{run_threaded, ThreadedHandler};

/// Configuration shared by all three dispatch modes.
///
/// Only the fields relevant to the chosen mode are consulted; the others are
/// ignored, mirroring the source's single `Config` struct used across all
/// three loops.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// TCP or UDP port to listen on.
    pub port: u16,
    /// Worker count in threaded mode. Ignored by the other two modes.
    pub threads: usize,
    /// TCP accept queue depth in threaded and multiplexed mode.
    pub backlog: u32,
    /// Number of connection slots in multiplexed mode.
    pub connection_slots: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            port: crate::DEFAULT_PORT,
            threads: 10,
            backlog: 10,
            connection_slots: 64,
        }
    }
}
