//! LRCP wire format: slash-delimited ASCII messages with backslash-escaped
//! data payloads.
//!
//! A packet looks like `/data/1234567/0/hello\/world/` — fields are
//! separated by `/`, and the data field may itself contain `/` or `\`,
//! escaped as `\/` and `\\` respectively. Malformed packets (bad escapes,
//! non-numeric fields, out-of-range numbers) are simply invalid LRCP and
//! are dropped by the caller; there's no peer to report a decode error to
//! until a session exists.

use std::fmt;

/// The largest legal value for any numeric field, per the protocol.
pub const MAX_NUMERIC_FIELD: u32 = 2_147_483_648;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Connect { session: u32 },
    Data { session: u32, pos: u32, data: Vec<u8> },
    Ack { session: u32, length: u32 },
    Close { session: u32 },
}

impl Message {
    pub fn session_id(&self) -> u32 {
        match self {
            Message::Connect { session }
            | Message::Data { session, .. }
            | Message::Ack { session, .. }
            | Message::Close { session } => *session,
        }
    }
}

#[derive(Debug)]
pub struct Error(String);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed LRCP packet: {}", self.0)
    }
}

impl std::error::Error for Error {}

fn err(msg: impl Into<String>) -> Error {
    Error(msg.into())
}

/// Decodes one UDP payload into a [`Message`].
pub fn decode(packet: &[u8]) -> Result<Message, Error> {
    if packet.first() != Some(&b'/') || packet.last() != Some(&b'/') || packet.len() < 2 {
        return Err(err("packet must start and end with '/'"));
    }
    let body = &packet[1..packet.len() - 1];
    let fields = split_fields(body)?;

    let kind = fields.first().ok_or_else(|| err("empty packet"))?;
    match kind.as_slice() {
        b"connect" => {
            expect_len(&fields, 2)?;
            Ok(Message::Connect { session: parse_field(&fields[1])? })
        }
        b"data" => {
            expect_len(&fields, 4)?;
            let session = parse_field(&fields[1])?;
            let pos = parse_field(&fields[2])?;
            let data = unescape(&fields[3])?;
            Ok(Message::Data { session, pos, data })
        }
        b"ack" => {
            expect_len(&fields, 3)?;
            let session = parse_field(&fields[1])?;
            let length = parse_field(&fields[2])?;
            Ok(Message::Ack { session, length })
        }
        b"close" => {
            expect_len(&fields, 2)?;
            Ok(Message::Close { session: parse_field(&fields[1])? })
        }
        other => Err(err(format!("unknown message type {:?}", String::from_utf8_lossy(other)))),
    }
}

/// Encodes a [`Message`] into a UDP payload.
pub fn encode(message: &Message) -> Vec<u8> {
    match message {
        Message::Connect { session } => format!("/connect/{session}/").into_bytes(),
        Message::Data { session, pos, data } => {
            let mut out = format!("/data/{session}/{pos}/").into_bytes();
            out.extend(escape(data));
            out.push(b'/');
            out
        }
        Message::Ack { session, length } => format!("/ack/{session}/{length}/").into_bytes(),
        Message::Close { session } => format!("/close/{session}/").into_bytes(),
    }
}

fn expect_len(fields: &[Vec<u8>], len: usize) -> Result<(), Error> {
    if fields.len() != len {
        return Err(err(format!("expected {len} fields, got {}", fields.len())));
    }
    Ok(())
}

fn parse_field(field: &[u8]) -> Result<u32, Error> {
    let s = std::str::from_utf8(field).map_err(|_| err("non-UTF8 numeric field"))?;
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err(format!("not a number: {s:?}")));
    }
    let value: u64 = s.parse().map_err(|_| err("numeric field overflow"))?;
    if value > MAX_NUMERIC_FIELD as u64 {
        return Err(err("numeric field exceeds protocol maximum"));
    }
    Ok(value as u32)
}

/// Splits `body` on unescaped `/` bytes, leaving escape sequences (`\/`,
/// `\\`) intact in each field's bytes for [`unescape`] to resolve.
fn split_fields(body: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
    let mut fields = Vec::new();
    let mut current = Vec::new();
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b'\\' => match body.get(i + 1) {
                Some(&b @ (b'/' | b'\\')) => {
                    current.push(b'\\');
                    current.push(b);
                    i += 2;
                }
                _ => return Err(err("invalid escape sequence")),
            },
            b'/' => {
                fields.push(std::mem::take(&mut current));
                i += 1;
            }
            b => {
                current.push(b);
                i += 1;
            }
        }
    }
    fields.push(current);
    Ok(fields)
}

fn unescape(field: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;
    while i < field.len() {
        if field[i] == b'\\' {
            match field.get(i + 1) {
                Some(b'/') => {
                    out.push(b'/');
                    i += 2;
                }
                Some(b'\\') => {
                    out.push(b'\\');
                    i += 2;
                }
                _ => return Err(err("invalid escape sequence in data field")),
            }
        } else {
            out.push(field[i]);
            i += 1;
        }
    }
    Ok(out)
}

fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if b == b'/' || b == b'\\' {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_data_with_escapes() {
        let msg = Message::Data { session: 7, pos: 0, data: b"a/b\\c".to_vec() };
        let encoded = encode(&msg);
        assert_eq!(encoded, b"/data/7/0/a\\/b\\\\c/");
        assert_eq!(decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn decodes_connect() {
        assert_eq!(decode(b"/connect/7/").unwrap(), Message::Connect { session: 7 });
    }

    #[test]
    fn rejects_missing_slashes() {
        assert!(decode(b"connect/7/").is_err());
    }

    #[test]
    fn rejects_field_count_mismatch() {
        assert!(decode(b"/ack/7/").is_err());
    }

    #[test]
    fn rejects_numeric_field_over_protocol_max() {
        assert!(decode(b"/connect/99999999999/").is_err());
    }
}
