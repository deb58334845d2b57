//! Single-threaded readiness-multiplexed loop over a fixed-size connection
//! table, the direct translation of an `epoll`/`poll` server into Rust.
//!
//! Unlike the threaded and datagram modes, this mode is deliberately *not*
//! built on Tokio: it owns its own OS thread and polls raw, non-blocking
//! sockets with `mio`, exactly mirroring the source's "build a readiness
//! set, block until something is ready, dispatch" loop. `mio` is the crate
//! Tokio itself is built on, and the example pack's ECS/networking code
//! (`SleepingPills-bushhammer`) reaches for it directly for the same kind of
//! raw, manual event loop — that's the precedent this module follows.

use std::io::{self, ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, error, info};

use crate::dispatcher::DispatcherConfig;
use crate::Result;

const LISTENER: Token = Token(0);

/// One slot in the fixed-size connection table.
///
/// `stream` is `None` for a free slot — the Rust equivalent of the source's
/// "file descriptor 0 means free" sentinel, without literally reusing a raw
/// fd as a sentinel value.
struct Slot<S> {
    stream: Option<TcpStream>,
    data: S,
}

impl<S: Default> Default for Slot<S> {
    fn default() -> Self {
        Slot { stream: None, data: S::default() }
    }
}

/// The fixed-size connection table, passed to the handler on every
/// invocation so it can read/write the ready connection and iterate over
/// every other live one (for broadcast-style protocols).
pub struct ConnTable<S> {
    slots: Vec<Slot<S>>,
}

/// A read-write view onto one live slot, handed to the handler instead of
/// the raw index so close semantics stay explicit (`close()` rather than a
/// magic write to an index).
pub struct Connection<'a, S> {
    table: &'a mut ConnTable<S>,
    index: usize,
}

impl<S: Default> ConnTable<S> {
    fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::default);
        ConnTable { slots }
    }

    fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.stream.is_none())
    }

    fn is_active(&self, index: usize) -> bool {
        self.slots.get(index).map(|s| s.stream.is_some()).unwrap_or(false)
    }

    /// Invoke `body` for every live connection other than `except`, handing
    /// it the connection's stream and per-connection data. This is the
    /// "peer iteration primitive" used to implement broadcast.
    pub fn for_each_other(
        &mut self,
        except: usize,
        mut body: impl FnMut(&mut TcpStream, &mut S),
    ) {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if idx == except {
                continue;
            }
            if let Some(stream) = slot.stream.as_mut() {
                body(stream, &mut slot.data);
            }
        }
    }
}

impl<'a, S: Default> Connection<'a, S> {
    /// The raw stream for this connection.
    pub fn stream(&mut self) -> &mut TcpStream {
        self.table.slots[self.index].stream.as_mut().expect("connection is live")
    }

    /// The per-connection scratch data.
    pub fn data(&mut self) -> &mut S {
        &mut self.table.slots[self.index].data
    }

    /// Every other live connection, for broadcast.
    pub fn peers(&mut self, body: impl FnMut(&mut TcpStream, &mut S)) {
        self.table.for_each_other(self.index, body);
    }

    /// Signals that this connection should be torn down: the dispatcher
    /// drops the stream and frees the slot for reuse on the next accept.
    /// The handler is never invoked for this slot again until it is reused
    /// by a new connection.
    pub fn close(&mut self) {
        self.table.slots[self.index] = Slot::default();
    }
}

/// A readiness-event handler invoked by [`run_multiplexed`].
///
/// Called once right after accept (to let the handler emit a greeting), and
/// once per readiness event thereafter, until the handler calls
/// [`Connection::close`].
pub trait MultiplexedHandler<S>: Fn(Connection<'_, S>) + Send + 'static {}
impl<S, T> MultiplexedHandler<S> for T where T: Fn(Connection<'_, S>) + Send + 'static {}

/// Runs the multiplexed dispatch loop on a dedicated OS thread and returns
/// immediately; the loop runs until the process exits.
pub async fn run_multiplexed<S>(
    config: DispatcherConfig,
    handler: impl MultiplexedHandler<S> + 'static,
) -> Result<()>
where
    S: Default + Send + 'static,
{
    let port = config.port;
    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

    thread::Builder::new()
        .name("multiplexed-dispatcher".into())
        .spawn(move || {
            if let Err(e) = event_loop(config, handler, ready_tx) {
                error!(error = %e, "multiplexed dispatcher terminated");
            }
        })
        .map_err(|e| -> crate::Error { format!("failed to spawn multiplexed loop: {e}").into() })?;

    ready_rx
        .await
        .map_err(|_| -> crate::Error { "multiplexed dispatcher failed to start".into() })??;

    info!(port, "multiplexed dispatcher started");
    Ok(())
}

fn event_loop<S>(
    config: DispatcherConfig,
    handler: impl MultiplexedHandler<S>,
    ready_tx: tokio::sync::oneshot::Sender<Result<()>>,
) -> Result<()>
where
    S: Default,
{
    let addr = format!("0.0.0.0:{}", config.port).parse().unwrap();
    let mut listener = match TcpListener::bind(addr) {
        Ok(l) => l,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("failed to bind multiplexed listener: {e}").into()));
            return Ok(());
        }
    };

    let mut poll = Poll::new()?;
    poll.registry().register(&mut listener, LISTENER, Interest::READABLE)?;

    let mut table: ConnTable<S> = ConnTable::new(config.connection_slots);
    let mut events = Events::with_capacity(config.connection_slots + 1);

    let _ = ready_tx.send(Ok(()));

    loop {
        if let Err(e) = poll.poll(&mut events, Some(Duration::from_millis(200))) {
            if e.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(e.into());
        }

        for event in events.iter() {
            match event.token() {
                LISTENER => accept_all(&mut listener, &mut poll, &mut table, &handler)?,
                Token(raw) => {
                    let index = raw - 1;
                    if !table.is_active(index) {
                        continue;
                    }
                    handler(Connection { table: &mut table, index });
                }
            }
        }
    }
}

fn accept_all<S: Default>(
    listener: &mut TcpListener,
    poll: &mut Poll,
    table: &mut ConnTable<S>,
    handler: &impl MultiplexedHandler<S>,
) -> Result<()> {
    loop {
        match listener.accept() {
            Ok((mut stream, peer)) => {
                let Some(index) = table.first_free() else {
                    debug!(%peer, "multiplexed connection table full, dropping accept");
                    continue;
                };
                poll.registry()
                    .register(&mut stream, Token(index + 1), Interest::READABLE)?;
                table.slots[index] = Slot { stream: Some(stream), data: S::default() };
                debug!(%peer, index, "accepted multiplexed connection");
                handler(Connection { table: &mut *table, index });
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
            Err(e) => {
                error!(error = %e, "multiplexed accept failed");
                return Ok(());
            }
        }
    }
}

/// Reads whatever is currently available into `buf`, returning `Ok(0)` on a
/// clean peer shutdown and swallowing `WouldBlock` as "nothing more right
/// now" (`Ok(usize::MAX)` sentinel would be un-idiomatic; callers should
/// treat any `Ok(n)` with `n < buf.len()` as "that's all there is for now").
pub fn read_available(stream: &mut TcpStream, buf: &mut [u8]) -> io::Result<usize> {
    match stream.read(buf) {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

/// Writes `buf` in full, looping past transient `WouldBlock`s.
///
/// Multiplexed-mode sockets are non-blocking; a short write under backpressure
/// is expected, not exceptional.
pub fn write_all_blocking(stream: &mut TcpStream, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf) {
            Ok(0) => return Err(io::Error::new(ErrorKind::WriteZero, "peer closed connection")),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
