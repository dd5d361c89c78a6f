//! Request and response messages as seen by the host.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::ResponseCodec;
use crate::error::{HostError, HostResult};

/// A command sent to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Command name.
    pub cmd: String,
    /// Command arguments. Always sent, empty if there are none.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Request {
    /// Create a request with no arguments.
    pub fn new(cmd: impl Into<String>) -> Self {
        Request {
            cmd: cmd.into(),
            data: Map::new(),
        }
    }

    /// Create a request with arguments.
    pub fn with_data(cmd: impl Into<String>, data: Map<String, Value>) -> Self {
        Request {
            cmd: cmd.into(),
            data,
        }
    }

    /// Encode as one line, terminator included.
    pub fn encode(&self) -> HostResult<Vec<u8>> {
        Ok(ResponseCodec::encode_line(&serde_json::to_string(self)?))
    }
}

/// Wire shape of a device response.
#[derive(Debug, Deserialize)]
struct WireResponse {
    ok: bool,
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    error: Option<String>,
}

/// A decoded device response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `{"ok": true, "data": {...}}`
    Ok(Map<String, Value>),
    /// `{"ok": false, "error": "..."}`
    Err(String),
}

impl Response {
    /// Parse a response line.
    ///
    /// The line must be a JSON object with a boolean `ok`.
    pub fn parse(line: &str) -> HostResult<Response> {
        let wire: WireResponse = serde_json::from_str(line)
            .map_err(|e| HostError::InvalidResponse(format!("{}: {}", e, line)))?;
        if wire.ok {
            Ok(Response::Ok(wire.data.unwrap_or_default()))
        } else {
            Ok(Response::Err(
                wire.error.unwrap_or_else(|| "unspecified error".to_string()),
            ))
        }
    }

    /// Check if this is a success.
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// Convert into the response data, or [`HostError::Device`] on failure.
    pub fn into_result(self) -> HostResult<Map<String, Value>> {
        match self {
            Response::Ok(data) => Ok(data),
            Response::Err(error) => Err(HostError::Device(error)),
        }
    }

    /// Render the response in its wire form.
    pub fn to_value(&self) -> Value {
        match self {
            Response::Ok(data) => serde_json::json!({"ok": true, "data": data}),
            Response::Err(error) => serde_json::json!({"ok": false, "error": error}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_always_has_data() {
        let line = Request::new("ping").encode().unwrap();
        assert_eq!(line, b"{\"cmd\":\"ping\",\"data\":{}}\n");
    }

    #[test]
    fn test_request_with_data() {
        let data = json!({"value": 0.5}).as_object().cloned().unwrap();
        let line = Request::with_data("servo.set", data).encode().unwrap();
        assert_eq!(line, b"{\"cmd\":\"servo.set\",\"data\":{\"value\":0.5}}\n");
    }

    #[test]
    fn test_parse_ok() {
        let resp = Response::parse(r#"{"ok":true,"data":{"v":5}}"#).unwrap();
        assert!(resp.is_ok());
        assert_eq!(resp.into_result().unwrap().get("v"), Some(&json!(5)));
    }

    #[test]
    fn test_parse_ok_without_data() {
        let resp = Response::parse(r#"{"ok":true}"#).unwrap();
        assert_eq!(resp, Response::Ok(Map::new()));
    }

    #[test]
    fn test_parse_error() {
        let resp = Response::parse(r#"{"ok":false,"error":"unknown cmd"}"#).unwrap();
        assert_eq!(resp, Response::Err("unknown cmd".to_string()));
        assert!(matches!(resp.into_result(), Err(HostError::Device(e)) if e == "unknown cmd"));
    }

    #[test]
    fn test_parse_rejects_non_responses() {
        assert!(Response::parse("booting...").is_err());
        assert!(Response::parse("[1]").is_err());
        assert!(Response::parse(r#"{"cmd":"ping"}"#).is_err());
        assert!(Response::parse(r#"{"ok":"yes"}"#).is_err());
    }

    #[test]
    fn test_to_value_round_trip() {
        let resp = Response::Err("bad json".to_string());
        assert_eq!(resp.to_value(), json!({"ok": false, "error": "bad json"}));
    }
}
