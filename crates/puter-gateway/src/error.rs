//! Error types for the HTTP gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use puter_host::HostError;
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while serving a gateway request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The device registry or link failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// A servo route was called but no servo device is configured.
    #[error("no servo device configured")]
    NoServo,

    /// A handler panicked while holding the registry lock.
    #[error("device registry lock poisoned")]
    Poisoned,

    /// The blocking task running the request failed.
    #[error("request task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Failed to bind to the TCP address.
    #[error("failed to bind on {addr}: {source}")]
    Bind {
        /// The address string.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server encountered an I/O error while serving.
    #[error("server error: {0}")]
    Serve(String),
}

impl GatewayError {
    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Host(HostError::UnknownDevice(_)) | GatewayError::NoServo => {
                StatusCode::NOT_FOUND
            }
            GatewayError::Host(HostError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Host(HostError::DeviceOffline(_)) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Host(HostError::Device(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `error` field. Device errors pass through verbatim.
    pub fn message(&self) -> String {
        match self {
            GatewayError::Host(HostError::Device(error)) => error.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "gateway request failed");
        }
        (status, Json(json!({"ok": false, "error": self.message()}))).into_response()
    }
}
