//! Puter Serial Device Protocol
//!
//! This crate implements the device side of a newline-delimited JSON command
//! protocol for serial-attached microcontrollers. The host writes one JSON
//! request per line and the device answers each line with exactly one JSON
//! response line.
//!
//! # Protocol Overview
//!
//! - **Requests** (host → device): `{"cmd": <string>, "data": <object, optional>}`
//! - **Success** (device → host): `{"ok": true, "data": <object>}`
//! - **Failure** (device → host): `{"ok": false, "error": <string>}`
//!
//! Lines end with `\n`. A `\r` before it is ignored. Line length and JSON
//! document size are bounded by [`LINE_BUF_SIZE`] and [`DOC_POOL_SIZE`].
//!
//! # Built-in Commands
//!
//! | cmd    | response data       |
//! |--------|---------------------|
//! | `ping` | `{id, fw, ms}`      |
//! | `info` | `{id, fw, baud}`    |
//!
//! Every other command is passed to the device's [`CommandHandler`].
//!
//! # Example
//!
//! ```rust
//! use puter_serial::{DeviceIdentity, JsonMap, JsonObject, MemoryPort, SerialDevice};
//!
//! fn handle(cmd: &str, data: &JsonMap, out: &mut JsonObject) -> bool {
//!     match cmd {
//!         "echo" => {
//!             for (k, v) in data {
//!                 let _ = out.insert(k, v.clone());
//!             }
//!             true
//!         }
//!         _ => false,
//!     }
//! }
//!
//! let mut device = SerialDevice::new(DeviceIdentity::new("demo", "1.0.0", 115_200), handle);
//! let mut port = MemoryPort::new();
//! device.begin(&mut port)?;
//!
//! port.push_rx(b"{\"cmd\":\"echo\",\"data\":{\"v\":5}}\n");
//! device.poll(&mut port)?;
//! assert_eq!(port.tx_lines(), vec![r#"{"ok":true,"data":{"v":5}}"#]);
//! # Ok::<(), puter_serial::SerialError>(())
//! ```

mod device;
mod document;
mod error;
mod framer;
mod handler;
mod port;
mod processor;

pub use device::*;
pub use document::*;
pub use error::*;
pub use framer::*;
pub use handler::*;
pub use port::*;
pub use processor::*;
