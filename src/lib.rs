//! Solutions to the Protohackers network challenges, built on a shared
//! server/dispatch framework.
//!
//! The purpose of this crate is to provide a realistically-sized example of
//! asynchronous Rust written with Tokio: a small dispatch layer that offers
//! three interchangeable I/O loops, and three challenge services built on
//! top of it. Do not use this in production.
//!
//! # Layout
//!
//! - [`dispatcher`]: the shared server framework — threaded, multiplexed,
//!   and datagram I/O loops behind one configuration surface.
//! - [`wire`]: small framing helpers (length-prefixed strings, big-endian
//!   integers, delimited lines) shared by the challenge protocols.
//! - [`speed_daemon`]: the road-traffic enforcement service (challenge 6).
//! - [`lrcp`]: the line-reversal reliable-stream protocol engine (challenge 7).
//! - [`job_centre`]: the priority job broker (challenge 9).

pub mod dispatcher;
pub mod wire;

pub mod speed_daemon;
pub mod lrcp;
pub mod job_centre;

/// The default port a challenge binary listens on if not otherwise configured.
pub const DEFAULT_PORT: u16 = 8088;

/// The error type returned by most functions in this crate.
///
/// A real application would likely reach for a dedicated error-handling
/// crate, or an `enum` that preserves the original error's type. A boxed
/// `std::error::Error` is good enough here. For performance-sensitive, very
/// frequently recoverable paths (wire-protocol framing) we use a hand-rolled
/// `enum` instead — see [`speed_daemon::protocol::Error`] and
/// [`lrcp::codec::Error`].
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A `Result` alias specialized to this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
