//! Line-based codec for the host side of the link.
//!
//! Device output is split into lines on `\n`. A trailing `\r` is stripped and
//! blank lines are skipped, so devices that print boot banners or use `\r\n`
//! endings are tolerated.

use bytes::{Buf, BytesMut};

/// Initial receive buffer capacity.
const INITIAL_CAPACITY: usize = 512;

/// A codec accumulating device output into lines.
#[derive(Debug)]
pub struct ResponseCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl Default for ResponseCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        ResponseCodec {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next non-blank line from the buffer.
    ///
    /// Returns `None` if no complete line is buffered.
    pub fn decode_line(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.iter().position(|&b| b == b'\n')?;
            let line = self.buffer.split_to(end);
            self.buffer.advance(1);

            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }

    /// Encode one JSON line for transmission.
    pub fn encode_line(json: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(json.len() + 1);
        buf.extend_from_slice(json.as_bytes());
        buf.push(b'\n');
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
