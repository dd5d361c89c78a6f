//! HTTP gateway for Puter devices.
//!
//! Serves the host's [`DeviceManager`](puter_host::DeviceManager) over JSON:
//! device listing, rescans, raw commands and a small servo API.

mod error;
pub mod router;
pub mod server;

pub use error::GatewayError;
pub use router::{build_router, AppState, ThrottleRequest};
pub use server::GatewayServer;
