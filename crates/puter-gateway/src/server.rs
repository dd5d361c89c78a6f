//! HTTP server that binds the gateway router to a TCP socket.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::error::GatewayError;
use crate::router::{build_router, AppState};

/// Axum-based HTTP server for the device gateway.
pub struct GatewayServer {
    pub(crate) addr: SocketAddr,
    pub(crate) state: AppState,
}

impl GatewayServer {
    pub fn new(state: AppState, addr: SocketAddr) -> Self {
        Self { addr, state }
    }

    /// Starts the server and blocks until it exits.
    pub async fn run(self) -> Result<(), GatewayError> {
        self.run_until(std::future::pending()).await
    }

    /// Starts the server and stops accepting requests once `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP bind fails or the server crashes.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let bind_error = |source: std::io::Error| GatewayError::Bind {
            addr: self.addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(self.addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(addr = %local_addr, "Puter gateway ready");

        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Serve(e.to_string()))?;

        tracing::info!("Puter gateway stopped");
        Ok(())
    }
}
