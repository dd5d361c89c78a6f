//! Byte-level line framing.
//!
//! Incoming bytes are accumulated into a fixed buffer until a line feed arrives.
//! Carriage returns are dropped so peers may use either `\n` or `\r\n` endings.
//! One byte of the buffer is always kept free for the terminator, so the longest
//! line the framer can deliver is `CAP - 1` bytes.

/// Line buffer capacity in bytes, including the reserved terminator slot.
pub const LINE_BUF_SIZE: usize = 180;

/// Line terminator.
pub const LINE_FEED: u8 = b'\n';

/// Ignored on input.
pub const CARRIAGE_RETURN: u8 = b'\r';

/// Outcome of feeding one byte into the framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// A complete line, without its terminator. May be empty.
    Line(&'a [u8]),
    /// The buffer filled up before a terminator arrived. The partial line and
    /// the byte that overflowed it have been discarded.
    Overflow,
}

/// Fixed-capacity line accumulator.
#[derive(Debug, Clone)]
pub struct LineFramer<const CAP: usize = LINE_BUF_SIZE> {
    buf: [u8; CAP],
    len: usize,
}

impl<const CAP: usize> Default for LineFramer<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> LineFramer<CAP> {
    /// Create an empty framer.
    pub const fn new() -> Self {
        LineFramer {
            buf: [0; CAP],
            len: 0,
        }
    }

    /// Longest line this framer delivers.
    pub const fn max_line_len(&self) -> usize {
        CAP.saturating_sub(1)
    }

    /// Feed the next byte from the stream.
    pub fn submit(&mut self, byte: u8) -> Option<Frame<'_>> {
        match byte {
            CARRIAGE_RETURN => None,
            LINE_FEED => {
                let len = self.len;
                self.len = 0;
                if len < CAP {
                    self.buf[len] = 0;
                }
                Some(Frame::Line(&self.buf[..len]))
            }
            _ if self.len < self.max_line_len() => {
                self.buf[self.len] = byte;
                self.len += 1;
                None
            }
            _ => {
                self.len = 0;
                Some(Frame::Overflow)
            }
        }
    }

    /// Bytes accumulated for the current line.
    pub fn pending(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Number of bytes accumulated for the current line.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes are pending.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop any partial line.
    pub fn reset(&mut self) {
        self.len = 0;
    }
}
