//! Error types for the serial command protocol.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors reported to the peer as `{"ok":false,"error":"..."}`.
///
/// The `Display` text of each variant is the exact string sent on the wire.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The line filled the line buffer before a terminator arrived.
    #[error("line too long")]
    LineTooLong,

    /// The line is not a JSON object, or it does not fit the document pool.
    #[error("bad json")]
    BadJson,

    /// The request has no `cmd`, or `cmd` is not a non-empty string.
    #[error("missing cmd")]
    MissingCmd,

    /// Neither a built-in command nor accepted by the device handler.
    #[error("unknown cmd")]
    UnknownCmd,
}

impl ErrorCode {
    /// Get the wire text for this error.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::LineTooLong => "line too long",
            ErrorCode::BadJson => "bad json",
            ErrorCode::MissingCmd => "missing cmd",
            ErrorCode::UnknownCmd => "unknown cmd",
        }
    }

    /// Parse an error code from its wire text.
    pub fn from_wire(s: &str) -> Option<ErrorCode> {
        match s {
            "line too long" => Some(ErrorCode::LineTooLong),
            "bad json" => Some(ErrorCode::BadJson),
            "missing cmd" => Some(ErrorCode::MissingCmd),
            "unknown cmd" => Some(ErrorCode::UnknownCmd),
            _ => None,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Errors raised by the fixed-capacity JSON documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The input is not syntactically valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The input is valid JSON but its root is not an object.
    #[error("JSON root is not an object")]
    NotAnObject,

    /// The document does not fit in its memory pool.
    #[error("document pool exhausted: capacity {capacity} bytes, required {required}")]
    PoolExhausted {
        /// Pool capacity in bytes.
        capacity: usize,
        /// Bytes the document would need.
        required: usize,
    },
}

impl From<DocumentError> for ErrorCode {
    fn from(_: DocumentError) -> Self {
        ErrorCode::BadJson
    }
}

/// Errors that escape [`SerialDevice::poll`](crate::SerialDevice::poll).
///
/// Protocol failures never show up here. They are answered on the wire instead.
#[derive(Debug, Error)]
pub enum SerialError {
    /// Writing to the serial sink failed.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias for serial device operations.
pub type SerialResult<T> = Result<T, SerialError>;
