//! Serial port abstraction.
//!
//! The device reads bytes one at a time without blocking and writes responses
//! through [`std::io::Write`].

use std::collections::VecDeque;
use std::io::{self, Write};

/// A byte stream source and sink.
pub trait SerialPort: Write {
    /// Take the next received byte, or `None` if nothing is available right now.
    fn read_byte(&mut self) -> Option<u8>;

    /// Configure the line rate. Ports without a physical line ignore it.
    fn set_baud(&mut self, _baud: u32) -> io::Result<()> {
        Ok(())
    }
}

/// An in-memory serial port.
///
/// Bytes pushed with [`push_rx`](MemoryPort::push_rx) are what the device reads.
/// Everything the device writes is collected and taken with
/// [`take_tx`](MemoryPort::take_tx).
#[derive(Debug, Default, Clone)]
pub struct MemoryPort {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    baud: Option<u32>,
}

impl MemoryPort {
    /// Create an empty port.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the device to read.
    pub fn push_rx(&mut self, data: &[u8]) {
        self.rx.extend(data);
    }

    /// Number of bytes waiting to be read.
    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }

    /// Bytes written by the device so far.
    pub fn tx(&self) -> &[u8] {
        &self.tx
    }

    /// Take everything written by the device.
    pub fn take_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }

    /// Complete lines written by the device, without terminators.
    pub fn tx_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.tx)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// The baud rate set by the device, if any.
    pub fn baud(&self) -> Option<u32> {
        self.baud
    }
}

impl Write for MemoryPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialPort for MemoryPort {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn set_baud(&mut self, baud: u32) -> io::Result<()> {
        self.baud = Some(baud);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_port_fifo() {
        let mut port = MemoryPort::new();
        port.push_rx(b"ab");
        port.push_rx(b"c");
        assert_eq!(port.rx_len(), 3);
        assert_eq!(port.read_byte(), Some(b'a'));
        assert_eq!(port.read_byte(), Some(b'b'));
        assert_eq!(port.read_byte(), Some(b'c'));
        assert_eq!(port.read_byte(), None);
    }

    #[test]
    fn test_memory_port_tx() {
        let mut port = MemoryPort::new();
        port.write_all(b"one\ntwo\n").unwrap();
        assert_eq!(port.tx_lines(), vec!["one", "two"]);
        assert_eq!(port.take_tx(), b"one\ntwo\n");
        assert!(port.tx().is_empty());
    }
}
