//! Line framing for the receive path.
//!
//! [`LineFramer`] is the sans-IO half: it accepts raw chunks and yields
//! complete CRLF-terminated lines. It doubles as a [`Decoder`], and
//! [`LineReader`] drives it through a [`FramedRead`] over any [`AsyncRead`].

use std::collections::VecDeque;

use bytes::BytesMut;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::debug;

use crate::error::TransportError;

/// Maximum number of bytes buffered without seeing a line delimiter.
pub const MAX_LINE_LEN: usize = 8191;

const DELIMITER: &str = "\r\n";

/// Splits a received byte stream into protocol lines.
///
/// Chunks that are not valid UTF-8 are skipped whole; the carry-over from
/// earlier chunks is left intact. A multi-byte character cut in half by a
/// chunk boundary is held back until the rest of it arrives. If the next
/// chunk does not complete it, the held bytes are dropped and the chunk is
/// decoded on its own.
#[derive(Debug)]
pub struct LineFramer {
    /// Decoded text after the last delimiter.
    carry: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    lines: VecDeque<String>,
    decode_failures: u64,
    max_line_len: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::with_max_line_len(MAX_LINE_LEN)
    }
}

impl LineFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty framer that, as a [`Decoder`], rejects more than
    /// `max_line_len` bytes without a delimiter.
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            carry: String::new(),
            pending: Vec::new(),
            lines: VecDeque::new(),
            decode_failures: 0,
            max_line_len,
        }
    }

    /// Append a received chunk and split out any completed lines.
    pub fn feed(&mut self, chunk: &[u8]) {
        if !self.pending.is_empty() {
            let mut bytes = std::mem::take(&mut self.pending);
            let held = bytes.len();
            bytes.extend_from_slice(chunk);
            if self.decode(&bytes) {
                return;
            }
            self.decode_failures += 1;
            debug!(bytes = held, "dropping incomplete UTF-8 sequence");
        }

        if !self.decode(chunk) {
            self.decode_failures += 1;
            debug!(bytes = chunk.len(), "skipping chunk that is not valid UTF-8");
        }
    }

    /// Decode `bytes` into the carry-over, holding back an incomplete
    /// trailing sequence. Leaves the framer untouched and returns `false`
    /// if `bytes` is not valid UTF-8.
    fn decode(&mut self, bytes: &[u8]) -> bool {
        let (text, pending) = match std::str::from_utf8(bytes) {
            Ok(text) => (text, &[][..]),
            Err(e) if e.error_len().is_none() => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // valid_up_to marks a prefix that is known to be UTF-8
                match std::str::from_utf8(valid) {
                    Ok(text) => (text, rest),
                    Err(_) => return false,
                }
            }
            Err(_) => return false,
        };

        self.carry.push_str(text);
        self.pending = pending.to_vec();
        self.split_lines();
        true
    }

    fn split_lines(&mut self) {
        let mut start = 0;
        while let Some(pos) = self.carry[start..].find(DELIMITER) {
            let end = start + pos;
            self.lines.push_back(self.carry[start..end].to_owned());
            start = end + DELIMITER.len();
        }
        if start > 0 {
            self.carry.drain(..start);
        }
    }

    /// Remove and return the oldest complete line.
    pub fn pop_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    /// Number of complete lines waiting to be taken.
    pub fn available(&self) -> usize {
        self.lines.len()
    }

    /// Bytes held back while waiting for a delimiter.
    pub fn buffered_len(&self) -> usize {
        self.carry.len() + self.pending.len()
    }

    /// Number of chunks discarded by the decode policy.
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }
}

impl Decoder for LineFramer {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        if !src.is_empty() {
            let chunk = src.split();
            self.feed(&chunk);
        }

        if let Some(line) = self.pop_line() {
            return Ok(Some(line));
        }

        let buffered = self.buffered_len();
        if buffered > self.max_line_len {
            return Err(TransportError::LineTooLong {
                actual: buffered,
                limit: self.max_line_len,
            });
        }
        Ok(None)
    }
}

/// Reads protocol lines from an async byte source.
pub struct LineReader<R> {
    frames: FramedRead<R, LineFramer>,
}

impl<R: AsyncRead> LineReader<R> {
    /// Wrap a reader with the default line length limit.
    pub fn new(reader: R) -> Self {
        Self::with_max_line_len(reader, MAX_LINE_LEN)
    }

    /// Wrap a reader with a custom line length limit.
    pub fn with_max_line_len(reader: R, max_line_len: usize) -> Self {
        Self {
            frames: FramedRead::with_capacity(
                reader,
                LineFramer::with_max_line_len(max_line_len),
                4096,
            ),
        }
    }

    /// The framer state, mostly useful for diagnostics.
    pub fn framer(&self) -> &LineFramer {
        self.frames.decoder()
    }
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wait for the next complete line.
    ///
    /// Read errors and end-of-stream surface as [`TransportError`]; no line
    /// is returned in that case. Cancelling the returned future does not
    /// lose data.
    pub async fn next_line(&mut self) -> Result<String, TransportError> {
        match self.frames.next().await {
            Some(line) => line,
            None => Err(TransportError::Closed),
        }
    }
}
