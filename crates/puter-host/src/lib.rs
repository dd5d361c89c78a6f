//! Puter Host Link
//!
//! This crate is the host side of the Puter serial command protocol. It sends
//! newline-delimited JSON requests to devices and waits for their responses.
//!
//! # Overview
//!
//! - [`DeviceLink`]: one connection, one request in flight, response timeout
//! - [`DeviceManager`]: devices keyed by id, with online/offline tracking
//! - [`HostConfig`]: the device list, loaded from YAML
//!
//! # Example
//!
//! ```rust,ignore
//! use puter_host::{DeviceManager, load_host_config};
//!
//! let config = load_host_config("devices.yaml")?;
//! let mut manager = DeviceManager::connect_all(&config);
//! let response = manager.send("light_controller", "ping", Default::default())?;
//! ```

mod codec;
mod config;
mod error;
mod link;
mod manager;
mod message;

pub use codec::*;
pub use config::*;
pub use error::*;
pub use link::*;
pub use manager::*;
pub use message::*;
