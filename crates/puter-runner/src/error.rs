//! Error types for the runner.

use thiserror::Error;

/// Errors that stop a runner command.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// I/O error (binding, accepting, runtime setup).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Simulated device failure.
    #[error("device error: {0}")]
    Serial(#[from] puter_serial::SerialError),

    /// Host link failure.
    #[error(transparent)]
    Host(#[from] puter_host::HostError),

    /// Command-line `--data` is not a JSON object.
    #[error("invalid --data: {0}")]
    InvalidData(String),

    /// Missing or conflicting command-line options.
    #[error("{0}")]
    Usage(String),

    /// HTTP gateway failure.
    #[error(transparent)]
    Gateway(#[from] puter_gateway::GatewayError),

    /// Installing the Ctrl-C handler failed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
