//! JSON-RPC 2.0 envelopes
//!
//! Shared by the server-side session transport and the widget bridge. Inbound
//! payloads are decoded once into [`IncomingMessage`] and dispatched on the
//! resulting variant.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Server-defined: the request did not reference a usable session.
pub const NO_VALID_SESSION: i64 = -32000;
/// Server-defined: the referenced session does not exist.
pub const SESSION_NOT_FOUND: i64 = -32001;

/// Request identifier, either numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    /// Reads an identifier from a raw `id` member. Floats, booleans and
    /// containers are not valid identifiers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Number),
            _ => None,
        }
    }
}

impl From<RequestId> for Value {
    fn from(id: RequestId) -> Self {
        match id {
            RequestId::Number(n) => Value::from(n),
            RequestId::String(s) => Value::String(s),
        }
    }
}

/// Ids above `i64::MAX` saturate; the bridge counter starts at 1 and never
/// gets there.
impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(i64::try_from(id).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// The `error` member of a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found").with_data(json!({ "method": method }))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Request {
        id: RequestId,
        method: String,
        params: Value,
    },
    Response {
        id: RequestId,
        outcome: Result<Value, RpcError>,
    },
    Notification {
        method: String,
        params: Value,
    },
    /// Anything lacking the JSON-RPC 2.0 envelope shape.
    Unrecognized,
}

impl IncomingMessage {
    pub fn decode(value: &Value) -> Self {
        let Some(envelope) = value.as_object() else {
            return Self::Unrecognized;
        };
        if envelope.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Self::Unrecognized;
        }

        let raw_id = envelope.get("id").filter(|id| !id.is_null());
        let id = match raw_id {
            Some(raw) => match RequestId::from_value(raw) {
                Some(id) => Some(id),
                None => return Self::Unrecognized,
            },
            None => None,
        };
        let params = envelope.get("params").cloned().unwrap_or(Value::Null);

        match (id, envelope.get("method")) {
            (_, Some(Value::String(method))) if method.is_empty() => Self::Unrecognized,
            (Some(id), Some(Value::String(method))) => Self::Request {
                id,
                method: method.clone(),
                params,
            },
            (None, Some(Value::String(method))) => Self::Notification {
                method: method.clone(),
                params,
            },
            (Some(id), None) => Self::decode_response(id, envelope),
            _ => Self::Unrecognized,
        }
    }

    fn decode_response(id: RequestId, envelope: &Map<String, Value>) -> Self {
        if let Some(error) = envelope.get("error") {
            return match serde_json::from_value::<RpcError>(error.clone()) {
                Ok(error) => Self::Response {
                    id,
                    outcome: Err(error),
                },
                Err(_) => Self::Unrecognized,
            };
        }
        match envelope.get("result") {
            Some(result) => Self::Response {
                id,
                outcome: Ok(result.clone()),
            },
            None => Self::Unrecognized,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            _ => None,
        }
    }
}

/// Builds a JSON-RPC 2.0 request.
pub fn rpc_request(id: impl Into<RequestId>, method: &str, params: Value) -> Value {
    let mut message = json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": Value::from(id.into()),
        "method": method,
    });
    if !params.is_null() {
        message["params"] = params;
    }
    message
}

/// Builds a JSON-RPC 2.0 notification (no `id`, no reply expected).
pub fn rpc_notification(method: &str, params: Value) -> Value {
    let mut message = json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
    });
    if !params.is_null() {
        message["params"] = params;
    }
    message
}

/// Builds a JSON-RPC 2.0 success response.
///
/// # Arguments
///
/// * `id` – The request identifier that must be echoed back.
/// * `result` – The payload representing the successful outcome.
pub fn rpc_success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

/// Builds a JSON-RPC 2.0 error response.
///
/// # Arguments
///
/// * `id` – The request identifier (or `null` if unavailable).
/// * `code` – The JSON-RPC error code (e.g., -32601 for method not found).
/// * `message` – Human-readable description of the error.
pub fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    rpc_error_response(id, RpcError::new(code, message))
}

/// Builds a JSON-RPC 2.0 error response from a full [`RpcError`].
pub fn rpc_error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": error,
    })
}
