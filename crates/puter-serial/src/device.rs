//! The polled serial device.
//!
//! A [`SerialDevice`] owns the line framer and the command processor. Each call
//! to [`poll`](SerialDevice::poll) drains every byte currently available on the
//! port and answers each complete line before reading the next byte.

use crate::error::{ErrorCode, SerialResult};
use crate::framer::{Frame, LineFramer};
use crate::handler::{CommandHandler, NoHandler};
use crate::port::SerialPort;
use crate::processor::{Clock, CommandProcessor, DeviceIdentity, MonotonicClock};

/// A device speaking the newline-delimited JSON command protocol.
#[derive(Debug)]
pub struct SerialDevice<H = NoHandler, C = MonotonicClock> {
    framer: LineFramer,
    processor: CommandProcessor<H, C>,
}

impl SerialDevice<NoHandler, MonotonicClock> {
    /// Create a device that only answers the built-in commands.
    pub fn builtin_only(identity: DeviceIdentity) -> Self {
        Self::new(identity, NoHandler)
    }
}

impl<H: CommandHandler> SerialDevice<H, MonotonicClock> {
    /// Create a device whose uptime starts now.
    pub fn new(identity: DeviceIdentity, handler: H) -> Self {
        SerialDevice {
            framer: LineFramer::new(),
            processor: CommandProcessor::new(identity, handler),
        }
    }
}

impl<H: CommandHandler, C: Clock> SerialDevice<H, C> {
    /// Create a device with a custom uptime clock.
    pub fn with_clock(identity: DeviceIdentity, handler: H, clock: C) -> Self {
        SerialDevice {
            framer: LineFramer::new(),
            processor: CommandProcessor::with_clock(identity, handler, clock),
        }
    }

    /// The device identity.
    pub fn identity(&self) -> &DeviceIdentity {
        self.processor.identity()
    }

    /// The command processor.
    pub fn processor(&self) -> &CommandProcessor<H, C> {
        &self.processor
    }

    /// Bytes of the line currently being received.
    pub fn pending_len(&self) -> usize {
        self.framer.len()
    }

    /// Discard a partially received line.
    ///
    /// Used when the peer on the other end of the line changes, so a prefix
    /// left by the previous peer is not joined to the next request.
    pub fn reset_line(&mut self) {
        if !self.framer.is_empty() {
            log::debug!(
                "[{}] discarding {} pending byte(s)",
                self.processor.identity().id,
                self.framer.len()
            );
        }
        self.framer.reset();
    }

    /// Configure the port for this device's baud rate.
    pub fn begin<P: SerialPort>(&self, port: &mut P) -> SerialResult<()> {
        port.set_baud(self.identity().baud)?;
        Ok(())
    }

    /// Drain all available input and answer every complete line.
    ///
    /// Returns the number of response lines written.
    pub fn poll<P: SerialPort>(&mut self, port: &mut P) -> SerialResult<usize> {
        let mut responses = 0;
        while let Some(byte) = port.read_byte() {
            if self.submit(byte, port)? {
                responses += 1;
            }
        }
        if responses > 0 {
            port.flush()?;
        }
        Ok(responses)
    }

    /// Feed one byte, writing a response to `sink` if it completed a line.
    ///
    /// Returns whether a response was written.
    pub fn submit<W: std::io::Write>(&mut self, byte: u8, sink: &mut W) -> SerialResult<bool> {
        match self.framer.submit(byte) {
            None => Ok(false),
            Some(Frame::Line(line)) => {
                log::trace!(
                    "[{}] line: {}",
                    self.processor.identity().id,
                    String::from_utf8_lossy(line)
                );
                self.processor.respond(line, sink)?;
                Ok(true)
            }
            Some(Frame::Overflow) => {
                self.processor.respond_error(ErrorCode::LineTooLong, sink)?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MemoryPort;

    fn device() -> SerialDevice {
        SerialDevice::builtin_only(DeviceIdentity::new("dev_1", "0.1", 9600))
    }

    #[test]
    fn test_begin_sets_baud() {
        let dev = device();
        let mut port = MemoryPort::new();
        dev.begin(&mut port).unwrap();
        assert_eq!(port.baud(), Some(9600));
    }

    #[test]
    fn test_poll_without_input() {
        let mut dev = device();
        let mut port = MemoryPort::new();
        assert_eq!(dev.poll(&mut port).unwrap(), 0);
        assert!(port.tx().is_empty());
    }

    #[test]
    fn test_poll_holds_partial_line() {
        let mut dev = device();
        let mut port = MemoryPort::new();
        port.push_rx(b"{\"cmd\":\"in");
        assert_eq!(dev.poll(&mut port).unwrap(), 0);
        assert_eq!(dev.pending_len(), 10);

        port.push_rx(b"fo\"}\r\n");
        assert_eq!(dev.poll(&mut port).unwrap(), 1);
        assert_eq!(
            port.tx_lines(),
            vec![r#"{"ok":true,"data":{"id":"dev_1","fw":"0.1","baud":9600}}"#]
        );
    }

    #[test]
    fn test_poll_answers_every_line() {
        let mut dev = device();
        let mut port = MemoryPort::new();
        port.push_rx(b"{\"cmd\":\"info\"}\n\nnope\n");
        assert_eq!(dev.poll(&mut port).unwrap(), 3);
        let lines = port.tx_lines();
        assert!(lines[0].starts_with(r#"{"ok":true"#));
        assert_eq!(lines[1], r#"{"ok":false,"error":"bad json"}"#);
        assert_eq!(lines[2], r#"{"ok":false,"error":"bad json"}"#);
    }

    #[test]
    fn test_reset_line_drops_partial_request() {
        let mut dev = device();
        let mut port = MemoryPort::new();
        port.push_rx(b"{\"cmd\":\"pi");
        assert_eq!(dev.poll(&mut port).unwrap(), 0);

        dev.reset_line();
        assert_eq!(dev.pending_len(), 0);

        port.push_rx(b"{\"cmd\":\"info\"}\n");
        assert_eq!(dev.poll(&mut port).unwrap(), 1);
        assert!(port.tx_lines()[0].starts_with(r#"{"ok":true"#));
    }
}
