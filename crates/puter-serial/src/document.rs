//! Fixed-capacity JSON documents.
//!
//! Both the request and the response are held in documents with a fixed memory
//! budget. A document's footprint is computed with a slot model: every object
//! member and array element costs one [`SLOT_SIZE`] slot, and every key and
//! string value costs its length plus a terminator byte. Numbers, booleans and
//! null are stored inside their slot.
//!
//! A request that does not fit fails to parse. A field that does not fit is not
//! added to the response. Neither case allocates past the budget.

use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;

use crate::error::{DocumentError, ErrorCode};

/// Memory budget of one JSON document in bytes.
pub const DOC_POOL_SIZE: usize = 256;

/// Cost of one object member or array element.
pub const SLOT_SIZE: usize = 16;

/// A JSON object, as seen by command handlers.
pub type JsonMap = Map<String, Value>;

/// Bytes a string costs in the pool.
fn string_cost(s: &str) -> usize {
    s.len() + 1
}

/// Bytes a value costs in the pool, excluding the slot that holds it.
pub fn value_footprint(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => 0,
        Value::String(s) => string_cost(s),
        Value::Array(items) => items.iter().map(|v| SLOT_SIZE + value_footprint(v)).sum(),
        Value::Object(map) => object_footprint(map),
    }
}

/// Bytes an object's members cost in the pool.
pub fn object_footprint(map: &JsonMap) -> usize {
    map.iter().map(|(k, v)| member_footprint(k, v)).sum()
}

fn member_footprint(key: &str, value: &Value) -> usize {
    SLOT_SIZE + string_cost(key) + value_footprint(value)
}

// ============================================================================
// Bounded Object
// ============================================================================

/// A JSON object with a byte budget.
///
/// Handlers receive the response's `data` object as a `JsonObject` and add their
/// result fields with [`insert`](JsonObject::insert).
#[derive(Debug, Clone, PartialEq)]
pub struct JsonObject {
    map: JsonMap,
    capacity: usize,
    used: usize,
}

impl JsonObject {
    /// Create an empty object with the given budget.
    pub fn with_capacity(capacity: usize) -> Self {
        JsonObject {
            map: Map::new(),
            capacity,
            used: 0,
        }
    }

    /// Add or replace a field.
    ///
    /// If the field does not fit, the object is left unchanged.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Result<(), DocumentError> {
        let value = value.into();
        let released = self
            .map
            .get(key)
            .map(|old| member_footprint(key, old))
            .unwrap_or(0);
        let required = self.used - released + member_footprint(key, &value);
        if required > self.capacity {
            return Err(DocumentError::PoolExhausted {
                capacity: self.capacity,
                required,
            });
        }
        self.map.insert(key.to_string(), value);
        self.used = required;
        Ok(())
    }

    /// Get a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let value = self.map.remove(key)?;
        self.used -= member_footprint(key, &value);
        Some(value)
    }

    /// Whether the object has the field.
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the object has no fields.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bytes used.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Total budget in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.capacity - self.used
    }

    /// Remove every field.
    pub fn clear(&mut self) {
        self.map.clear();
        self.used = 0;
    }

    /// View the fields as a plain JSON map.
    pub fn as_map(&self) -> &JsonMap {
        &self.map
    }
}

// ============================================================================
// Request Document
// ============================================================================

/// The decoded form of one request line.
#[derive(Debug, Clone)]
pub struct RequestDocument {
    capacity: usize,
    root: JsonMap,
    empty: JsonMap,
}

impl Default for RequestDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestDocument {
    /// Create a request document with the default pool size.
    pub fn new() -> Self {
        Self::with_capacity(DOC_POOL_SIZE)
    }

    /// Create a request document with a custom pool size.
    pub fn with_capacity(capacity: usize) -> Self {
        RequestDocument {
            capacity,
            root: Map::new(),
            empty: Map::new(),
        }
    }

    /// Pool size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the document and parse `line` into it.
    ///
    /// On error the document is left empty.
    pub fn parse(&mut self, line: &[u8]) -> Result<(), DocumentError> {
        self.clear();
        let value: Value = serde_json::from_slice(line)
            .map_err(|e| DocumentError::InvalidJson(e.to_string()))?;
        let Value::Object(root) = value else {
            return Err(DocumentError::NotAnObject);
        };
        let required = object_footprint(&root);
        if required > self.capacity {
            return Err(DocumentError::PoolExhausted {
                capacity: self.capacity,
                required,
            });
        }
        self.root = root;
        Ok(())
    }

    /// The `cmd` field, if it is a non-empty string.
    pub fn cmd(&self) -> Option<&str> {
        self.root
            .get("cmd")
            .and_then(Value::as_str)
            .filter(|cmd| !cmd.is_empty())
    }

    /// The `data` field if it is an object, otherwise an empty object.
    pub fn data(&self) -> &JsonMap {
        match self.root.get("data") {
            Some(Value::Object(data)) => data,
            _ => &self.empty,
        }
    }

    /// The whole decoded object.
    pub fn root(&self) -> &JsonMap {
        &self.root
    }

    /// Drop the decoded object.
    pub fn clear(&mut self) {
        self.root.clear();
    }
}

// ============================================================================
// Response Document
// ============================================================================

/// Wire shape of a response line. Exactly one of `data` and `error` is set.
#[derive(Serialize)]
struct WireResponse<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a JsonMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorCode>,
}

/// Bytes the root `ok` and `data` members take from the response pool.
const RESPONSE_ROOT_COST: usize = SLOT_SIZE + 3 + SLOT_SIZE + 5;

/// The response being built for the current line.
#[derive(Debug, Clone)]
pub struct ResponseDocument {
    ok: bool,
    data: JsonObject,
    error: Option<ErrorCode>,
}

impl Default for ResponseDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseDocument {
    /// Create a response document with the default pool size.
    pub fn new() -> Self {
        Self::with_capacity(DOC_POOL_SIZE)
    }

    /// Create a response document with a custom pool size.
    pub fn with_capacity(capacity: usize) -> Self {
        ResponseDocument {
            ok: false,
            data: JsonObject::with_capacity(capacity.saturating_sub(RESPONSE_ROOT_COST)),
            error: None,
        }
    }

    /// Reset to an empty, not-ok document.
    pub fn clear(&mut self) {
        self.ok = false;
        self.data.clear();
        self.error = None;
    }

    /// Clear the document and return its empty `data` object.
    pub fn begin_data(&mut self) -> &mut JsonObject {
        self.clear();
        &mut self.data
    }

    /// The `data` object.
    pub fn data(&self) -> &JsonObject {
        &self.data
    }

    /// Mutable access to the `data` object.
    pub fn data_mut(&mut self) -> &mut JsonObject {
        &mut self.data
    }

    /// Mark the response as successful.
    pub fn set_ok(&mut self) {
        self.ok = true;
        self.error = None;
    }

    /// Replace the response with an error. Any `data` is discarded.
    pub fn set_error(&mut self, code: ErrorCode) {
        self.clear();
        self.error = Some(code);
    }

    /// Whether the response is a success.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// The error, if the response is a failure.
    pub fn error(&self) -> Option<ErrorCode> {
        self.error
    }

    /// Label for the response outcome: `ok` or the wire error text.
    pub fn outcome(&self) -> &'static str {
        match self.error {
            Some(code) => code.as_str(),
            None if self.ok => "ok",
            None => ErrorCode::UnknownCmd.as_str(),
        }
    }

    fn wire(&self) -> WireResponse<'_> {
        if self.ok {
            WireResponse {
                ok: true,
                data: Some(self.data.as_map()),
                error: None,
            }
        } else {
            WireResponse {
                ok: false,
                data: None,
                error: Some(self.error.unwrap_or(ErrorCode::UnknownCmd)),
            }
        }
    }

    /// Serialize as one line, terminator included.
    pub fn write_line<W: Write>(&self, sink: &mut W) -> Result<(), crate::SerialError> {
        serde_json::to_writer(&mut *sink, &self.wire())?;
        sink.write_all(b"\n")?;
        Ok(())
    }

    /// Serialize as one line into a new buffer, terminator included.
    pub fn to_line(&self) -> Result<Vec<u8>, crate::SerialError> {
        let mut line = Vec::with_capacity(64);
        self.write_line(&mut line)?;
        Ok(line)
    }
}
