//! Error types for the host link.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to a device.
#[derive(Debug, Error)]
pub enum HostError {
    /// I/O error on the device stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// No response arrived before the deadline.
    #[error("timed out after {timeout:?} waiting for response to {cmd:?}")]
    Timeout {
        /// Command that was sent.
        cmd: String,
        /// How long the host waited.
        timeout: Duration,
    },

    /// The device closed the stream.
    #[error("device closed the connection")]
    Disconnected,

    /// A line is not a valid response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The device answered with `ok: false`.
    #[error("device error: {0}")]
    Device(String),

    /// No device is registered under this id.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// The device is registered but not connected.
    #[error("device offline: {0}")]
    DeviceOffline(String),

    /// Host configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Host configuration could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl HostError {
    /// Short label used for the `result` metric label.
    pub fn metric_label(&self) -> &'static str {
        match self {
            HostError::Timeout { .. } => "timeout",
            HostError::Device(_) => "device_error",
            HostError::InvalidResponse(_) => "invalid_response",
            _ => "io_error",
        }
    }
}

/// Result type alias for host operations.
pub type HostResult<T> = Result<T, HostError>;
