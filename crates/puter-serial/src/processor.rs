//! Request decoding and command dispatch.
//!
//! Each framed line produces exactly one response:
//!
//! 1. The line is parsed into the request document (`bad json` on failure).
//! 2. `cmd` must be a non-empty string (`missing cmd` otherwise).
//! 3. `ping` and `info` are answered from the device identity.
//! 4. Anything else goes to the [`CommandHandler`] (`unknown cmd` if refused).

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Instant;

use puter_metrics::{metric_defs, MetricLabels};

use crate::document::{JsonObject, RequestDocument, ResponseDocument, DOC_POOL_SIZE};
use crate::error::{ErrorCode, SerialResult};
use crate::handler::CommandHandler;

/// Built-in command answering with identity and uptime.
pub const CMD_PING: &str = "ping";

/// Built-in command answering with identity and baud rate.
pub const CMD_INFO: &str = "info";

/// Default serial baud rate.
pub const DEFAULT_BAUD: u32 = 115_200;

// ============================================================================
// Device Identity
// ============================================================================

/// Immutable identity reported by the built-in commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Device identifier (e.g. "light_controller").
    pub id: String,
    /// Firmware version string.
    pub fw: String,
    /// Serial baud rate.
    pub baud: u32,
}

impl DeviceIdentity {
    /// Create a device identity.
    pub fn new(id: impl Into<String>, fw: impl Into<String>, baud: u32) -> Self {
        DeviceIdentity {
            id: id.into(),
            fw: fw.into(),
            baud,
        }
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Monotonic millisecond clock used for `ping` uptime.
pub trait Clock {
    /// Milliseconds since the device started.
    fn millis(&self) -> u64;
}

impl<F> Clock for F
where
    F: Fn() -> u64,
{
    fn millis(&self) -> u64 {
        self()
    }
}

/// Uptime measured from when the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    started: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Start a clock at zero.
    pub fn new() -> Self {
        MonotonicClock {
            started: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn millis(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

// ============================================================================
// Command Processor
// ============================================================================

/// Turns framed lines into responses.
///
/// The request and response documents are owned by the processor and reused for
/// every line.
#[derive(Debug)]
pub struct CommandProcessor<H, C = MonotonicClock> {
    identity: DeviceIdentity,
    handler: H,
    clock: C,
    request: RequestDocument,
    response: ResponseDocument,
    labels: MetricLabels,
}

impl<H: CommandHandler> CommandProcessor<H, MonotonicClock> {
    /// Create a processor with a clock starting now.
    pub fn new(identity: DeviceIdentity, handler: H) -> Self {
        Self::with_clock(identity, handler, MonotonicClock::new())
    }
}

impl<H: CommandHandler, C: Clock> CommandProcessor<H, C> {
    /// Create a processor with a custom clock.
    pub fn with_clock(identity: DeviceIdentity, handler: H, clock: C) -> Self {
        Self::with_pool_size(identity, handler, clock, DOC_POOL_SIZE)
    }

    /// Create a processor with a custom clock and document pool size.
    pub fn with_pool_size(identity: DeviceIdentity, handler: H, clock: C, pool_size: usize) -> Self {
        let labels = MetricLabels::new(identity.id.clone());
        CommandProcessor {
            identity,
            handler,
            clock,
            request: RequestDocument::with_capacity(pool_size),
            response: ResponseDocument::with_capacity(pool_size),
            labels,
        }
    }

    /// The device identity.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// The device handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Build the response for one line.
    pub fn process(&mut self, line: &[u8]) -> &ResponseDocument {
        metrics::counter!(metric_defs::DEVICE_LINES.name, &self.labels.to_labels()).increment(1);
        if let Err(code) = self.dispatch(line) {
            log::debug!("[{}] rejecting line: {}", self.identity.id, code);
            self.response.set_error(code);
        }
        self.record_outcome();
        &self.response
    }

    /// Build the error response for a line that was never framed.
    pub fn reject(&mut self, code: ErrorCode) -> &ResponseDocument {
        metrics::counter!(metric_defs::DEVICE_LINES.name, &self.labels.to_labels()).increment(1);
        log::debug!("[{}] rejecting line: {}", self.identity.id, code);
        self.response.set_error(code);
        self.record_outcome();
        &self.response
    }

    /// Process one line and write its response to `sink`.
    pub fn respond<W: Write>(&mut self, line: &[u8], sink: &mut W) -> SerialResult<()> {
        self.process(line).write_line(sink)
    }

    /// Write the error response for a line that was never framed.
    pub fn respond_error<W: Write>(&mut self, code: ErrorCode, sink: &mut W) -> SerialResult<()> {
        self.reject(code).write_line(sink)
    }

    fn dispatch(&mut self, line: &[u8]) -> Result<(), ErrorCode> {
        self.request.parse(line)?;
        let cmd = self.request.cmd().ok_or(ErrorCode::MissingCmd)?;
        log::trace!("[{}] cmd={}", self.identity.id, cmd);

        match cmd {
            CMD_PING => {
                let ms = self.clock.millis();
                let out = self.response.begin_data();
                put(out, "id", self.identity.id.as_str());
                put(out, "fw", self.identity.fw.as_str());
                put(out, "ms", ms);
                self.response.set_ok();
                Ok(())
            }
            CMD_INFO => {
                let out = self.response.begin_data();
                put(out, "id", self.identity.id.as_str());
                put(out, "fw", self.identity.fw.as_str());
                put(out, "baud", self.identity.baud);
                self.response.set_ok();
                Ok(())
            }
            _ => {
                metrics::counter!(metric_defs::DEVICE_HANDLER_CALLS.name, &self.labels.to_labels())
                    .increment(1);
                let data = self.request.data();
                let out = self.response.begin_data();
                if self.handler.handle(cmd, data, out) {
                    self.response.set_ok();
                    Ok(())
                } else {
                    Err(ErrorCode::UnknownCmd)
                }
            }
        }
    }

    fn record_outcome(&self) {
        let labels = self
            .labels
            .with(&[("outcome", self.response.outcome().to_string())]);
        metrics::counter!(metric_defs::DEVICE_RESPONSES.name, &labels).increment(1);
    }
}

/// Add a built-in field, dropping it if the response pool is full.
fn put(out: &mut JsonObject, key: &str, value: impl Into<serde_json::Value>) {
    if let Err(e) = out.insert(key, value) {
        log::warn!("dropping built-in field {}: {}", key, e);
    }
}
