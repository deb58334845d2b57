//! The application-facing half of an LRCP session: a byte-oriented stream
//! with blocking `get_char`/`put_char` primitives, decoupled from the
//! session's retransmission and framing concerns by a pair of channels.
//!
//! Naming these `get_char`/`put_char` rather than `read`/`write` keeps faith
//! with the per-character handoff the underlying challenge describes: the
//! reversal application below only ever needs one byte at a time.

use std::collections::VecDeque;

use tokio::sync::mpsc;

/// Soft cap on outstanding unsent application bytes. `put_char` blocks once
/// this many bytes are queued ahead of it, so a fast writer can't grow the
/// session's unacked send buffer without bound.
pub const OUTGOING_SOFT_CAP: usize = 800;

/// A session's application-facing byte stream.
pub struct AppStream {
    incoming_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    incoming_buf: VecDeque<u8>,
    outgoing_tx: mpsc::Sender<u8>,
}

impl AppStream {
    pub(crate) fn new(incoming_rx: mpsc::UnboundedReceiver<Vec<u8>>, outgoing_tx: mpsc::Sender<u8>) -> Self {
        AppStream { incoming_rx, incoming_buf: VecDeque::new(), outgoing_tx }
    }

    /// Blocks until the next byte of reassembled, in-order stream data is
    /// available, or returns `None` once the session has closed for good.
    pub async fn get_char(&mut self) -> Option<u8> {
        loop {
            if let Some(b) = self.incoming_buf.pop_front() {
                return Some(b);
            }
            let chunk = self.incoming_rx.recv().await?;
            self.incoming_buf.extend(chunk);
        }
    }

    /// Queues one byte for delivery to the peer, blocking while the
    /// outbound channel is at its soft cap — the coroutine's backpressure
    /// contract, so a fast writer can't outrun a slow or unresponsive peer.
    pub async fn put_char(&self, byte: u8) {
        let _ = self.outgoing_tx.send(byte).await;
    }
}

/// The reference application run over every LRCP session: read a
/// newline-terminated line, reverse it, and write it back (the session's
/// line-reversal behavior the protocol is named for).
pub async fn run_line_reversal(mut stream: AppStream) {
    let mut line = Vec::new();
    while let Some(byte) = stream.get_char().await {
        if byte == b'\n' {
            line.reverse();
            for &b in &line {
                stream.put_char(b).await;
            }
            stream.put_char(b'\n').await;
            line.clear();
        } else {
            line.push(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_char_drains_buffered_chunks_before_blocking() {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, _outgoing_rx) = mpsc::channel(OUTGOING_SOFT_CAP);
        let mut stream = AppStream::new(incoming_rx, outgoing_tx);

        incoming_tx.send(b"ab".to_vec()).unwrap();
        assert_eq!(stream.get_char().await, Some(b'a'));
        assert_eq!(stream.get_char().await, Some(b'b'));
    }

    #[tokio::test]
    async fn reverses_each_line_independently() {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel(OUTGOING_SOFT_CAP);
        let stream = AppStream::new(incoming_rx, outgoing_tx);

        let handle = tokio::spawn(run_line_reversal(stream));
        incoming_tx.send(b"hello\nworld\n".to_vec()).unwrap();
        drop(incoming_tx);

        let mut out = Vec::new();
        while let Some(b) = outgoing_rx.recv().await {
            out.push(b);
        }
        handle.await.unwrap();
        assert_eq!(out, b"olleh\ndlrow\n");
    }
}
