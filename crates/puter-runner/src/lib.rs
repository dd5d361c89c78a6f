//! Puter runner library.
//!
//! Pieces behind the `puter` binary: a simulated device served over TCP and
//! the demo command handler it runs.

pub mod demo;
pub mod error;
pub mod sim;
pub mod uart_server;

pub use error::{RunnerError, RunnerResult};
pub use sim::{SimConfig, SimulatedDevice};
