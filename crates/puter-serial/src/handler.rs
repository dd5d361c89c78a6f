//! Device-specific command handling.
//!
//! Built-in commands are answered by the [`CommandProcessor`](crate::CommandProcessor).
//! Every other command is delegated to a [`CommandHandler`], which writes result
//! fields into the response's `data` object and reports whether it recognized the
//! command. The handler never sees the rest of the response, so it cannot set `ok`.
//!
//! Any `fn(&str, &JsonMap, &mut JsonObject) -> bool` is a handler:
//!
//! ```rust
//! use puter_serial::{JsonMap, JsonObject};
//!
//! fn handle(cmd: &str, data: &JsonMap, out: &mut JsonObject) -> bool {
//!     match cmd {
//!         "led.set" => {
//!             let on = data.get("on").and_then(|v| v.as_bool()).unwrap_or(false);
//!             let _ = out.insert("on", on);
//!             true
//!         }
//!         _ => false,
//!     }
//! }
//! ```

use crate::document::{JsonMap, JsonObject};

/// Handler for commands that are not built in.
///
/// Implementations must return promptly and must not read further input.
pub trait CommandHandler {
    /// Handle `cmd`, writing result fields into `out`.
    ///
    /// Returns `false` if the command is not recognized. Anything written to
    /// `out` is then discarded.
    fn handle(&mut self, cmd: &str, data: &JsonMap, out: &mut JsonObject) -> bool;
}

impl<F> CommandHandler for F
where
    F: FnMut(&str, &JsonMap, &mut JsonObject) -> bool,
{
    fn handle(&mut self, cmd: &str, data: &JsonMap, out: &mut JsonObject) -> bool {
        self(cmd, data, out)
    }
}

/// The absent handler: a device with no commands beyond the built-ins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoHandler;

impl CommandHandler for NoHandler {
    fn handle(&mut self, _cmd: &str, _data: &JsonMap, _out: &mut JsonObject) -> bool {
        false
    }
}

/// The plain function form of a handler.
pub type HandlerFn = fn(&str, &JsonMap, &mut JsonObject) -> bool;
