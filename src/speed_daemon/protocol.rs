//! Speed Daemon wire protocol: message types, framing, and encode/decode.
//!
//! Every message starts with a one-byte type tag followed by a fixed shape
//! of big-endian integers and `str8` strings (see [`crate::wire`]). This
//! mirrors the source's `Frame`/`Parse` split: a hand-rolled `Error` enum
//! distinguishes "the peer disconnected cleanly between messages" from
//! "the peer sent garbage", since only the latter warrants an `Error`
//! message back before closing the socket.

use std::fmt;
use std::marker::Unpin;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::wire::{self, UnexpectedEof};

const TYPE_ERROR: u8 = 0x10;
const TYPE_PLATE: u8 = 0x20;
const TYPE_TICKET: u8 = 0x21;
const TYPE_WANT_HEARTBEAT: u8 = 0x40;
const TYPE_HEARTBEAT: u8 = 0x41;
const TYPE_IAM_CAMERA: u8 = 0x80;
const TYPE_IAM_DISPATCHER: u8 = 0x81;

/// A message received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Plate { plate: String, timestamp: u32 },
    WantHeartbeat { interval: u32 },
    IAmCamera { road: u16, mile: u16, limit: u16 },
    IAmDispatcher { roads: Vec<u16> },
}

/// A message sent to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Error { message: String },
    Ticket {
        plate: String,
        road: u16,
        mile1: u16,
        timestamp1: u32,
        mile2: u16,
        timestamp2: u32,
        speed_centi_mph: u16,
    },
    Heartbeat,
}

/// Protocol-level errors, split the way the source splits `frame::Error`
/// from an ordinary I/O error: `Eof` means the peer is gone and there's no
/// one to send an `Error` message to, `Malformed` means the peer is still
/// there and broke protocol.
#[derive(Debug)]
pub enum Error {
    /// The connection closed (or the OS read failed) while waiting for a
    /// message. Not a protocol violation.
    Eof,
    /// The peer sent a message that doesn't parse: unknown type byte, or a
    /// value forbidden by the protocol (e.g. an empty dispatcher road list).
    Malformed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Eof => write!(f, "connection closed"),
            Error::Malformed(msg) => write!(f, "malformed message: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<UnexpectedEof> for Error {
    fn from(_: UnexpectedEof) -> Self {
        Error::Eof
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Eof
        } else {
            Error::Malformed(e.to_string())
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::Malformed(format!("invalid plate string: {e}"))
    }
}

/// Reads and decodes a single [`ClientMessage`] from `reader`.
///
/// Returns [`Error::Eof`] if the stream ends before a type byte arrives
/// (the normal "client hung up while idle" case); any other failure is
/// [`Error::Malformed`].
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<ClientMessage, Error> {
    let msg_type = match wire::read_u8(reader).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(Error::Eof),
        Err(e) => return Err(e.into()),
    };

    match msg_type {
        TYPE_PLATE => {
            let plate = String::from_utf8(wire::read_str8(reader).await?)?;
            let timestamp = wire::read_u32(reader).await?;
            Ok(ClientMessage::Plate { plate, timestamp })
        }
        TYPE_WANT_HEARTBEAT => {
            let interval = wire::read_u32(reader).await?;
            Ok(ClientMessage::WantHeartbeat { interval })
        }
        TYPE_IAM_CAMERA => {
            let road = wire::read_u16(reader).await?;
            let mile = wire::read_u16(reader).await?;
            let limit = wire::read_u16(reader).await?;
            Ok(ClientMessage::IAmCamera { road, mile, limit })
        }
        TYPE_IAM_DISPATCHER => {
            let count = wire::read_u8(reader).await?;
            let mut roads = Vec::with_capacity(count as usize);
            for _ in 0..count {
                roads.push(wire::read_u16(reader).await?);
            }
            if roads.is_empty() {
                return Err(Error::Malformed("dispatcher with no roads".into()));
            }
            Ok(ClientMessage::IAmDispatcher { roads })
        }
        other => Err(Error::Malformed(format!("unknown message type 0x{other:02x}"))),
    }
}

impl ServerMessage {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            ServerMessage::Error { message } => {
                buf.push(TYPE_ERROR);
                wire::put_str8(&mut buf, message.as_bytes());
            }
            ServerMessage::Ticket {
                plate,
                road,
                mile1,
                timestamp1,
                mile2,
                timestamp2,
                speed_centi_mph,
            } => {
                buf.push(TYPE_TICKET);
                wire::put_str8(&mut buf, plate.as_bytes());
                buf.extend_from_slice(&road.to_be_bytes());
                buf.extend_from_slice(&mile1.to_be_bytes());
                buf.extend_from_slice(&timestamp1.to_be_bytes());
                buf.extend_from_slice(&mile2.to_be_bytes());
                buf.extend_from_slice(&timestamp2.to_be_bytes());
                buf.extend_from_slice(&speed_centi_mph.to_be_bytes());
            }
            ServerMessage::Heartbeat => {
                buf.push(TYPE_HEARTBEAT);
            }
        }
        buf
    }
}

/// Encodes and writes `message` to `writer`.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &ServerMessage,
) -> std::io::Result<()> {
    writer.write_all(&message.encode()).await
}
