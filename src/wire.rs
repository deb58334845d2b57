//! Small framing helpers shared by the challenge wire protocols.
//!
//! Each challenge speaks its own protocol, but the low-level plumbing —
//! reading a length-prefixed string, a fixed-width big-endian integer, or a
//! line delimited by a sentinel byte — is identical across them. Centralizing
//! it here keeps `speed_daemon::protocol` and friends focused on framing
//! shape rather than byte-twiddling.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Reached end-of-stream while a caller expected more bytes.
///
/// Distinct from a generic I/O error so callers can tell "the peer hung up
/// between messages" (expected, not a protocol violation) apart from
/// "the peer hung up mid-message" (also just a closed connection, but worth
/// a different log line upstream).
#[derive(Debug)]
pub struct UnexpectedEof;

impl std::fmt::Display for UnexpectedEof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("unexpected end of stream")
    }
}

impl std::error::Error for UnexpectedEof {}

/// Reads a `str8`: a `u8` length prefix followed by that many bytes.
///
/// The bytes are not required to be valid UTF-8 by this function; callers
/// that need a `String` should validate separately (plate numbers in Speed
/// Daemon are treated as opaque byte strings on the wire, but are ASCII in
/// practice).
pub async fn read_str8<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let len = reader.read_u8().await? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Reads a big-endian `u8`.
pub async fn read_u8<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<u8> {
    reader.read_u8().await
}

/// Reads a big-endian `u16`.
pub async fn read_u16<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<u16> {
    reader.read_u16().await
}

/// Reads a big-endian `u32`.
pub async fn read_u32<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<u32> {
    reader.read_u32().await
}

/// Writes a `str8` (length-prefixed byte string) into `buf`.
///
/// Panics if `bytes` is longer than 255 — every caller in this crate bounds
/// its strings (plate numbers, error messages) well under that, so this is
/// treated as a programmer error rather than a recoverable one.
pub fn put_str8(buf: &mut Vec<u8>, bytes: &[u8]) {
    assert!(bytes.len() <= u8::MAX as usize, "str8 payload too long");
    buf.push(bytes.len() as u8);
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_str8() {
        let mut buf = Vec::new();
        put_str8(&mut buf, b"UN1X");
        let mut cursor = Cursor::new(buf);
        let out = read_str8(&mut cursor).await.unwrap();
        assert_eq!(out, b"UN1X");
    }

    #[tokio::test]
    async fn reads_big_endian_integers() {
        let mut cursor = Cursor::new(vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x02]);
        assert_eq!(read_u16(&mut cursor).await.unwrap(), 1);
        assert_eq!(read_u32(&mut cursor).await.unwrap(), 2);
    }

    #[test]
    #[should_panic(expected = "too long")]
    fn rejects_oversized_str8() {
        let mut buf = Vec::new();
        put_str8(&mut buf, &vec![0u8; 256]);
    }
}
