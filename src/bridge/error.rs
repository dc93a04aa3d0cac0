use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::jsonrpc::RpcError;

/// Failures surfaced to callers of the bridge.
///
/// Cloneable so a single handshake outcome can be handed to every caller of
/// `initialize`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("request {id} ({method}) timed out after {timeout:?}")]
    RequestTimeout {
        id: u64,
        method: String,
        timeout: Duration,
    },
    #[error("{message} (code {code})")]
    Remote {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("bridge has been destroyed")]
    ClientDestroyed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid {method} response: {reason}")]
    InvalidResponse { method: String, reason: String },
}

impl From<RpcError> for BridgeError {
    fn from(error: RpcError) -> Self {
        Self::Remote {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remote_errors_keep_code_and_data() {
        let err = BridgeError::from(RpcError::new(-32050, "nope").with_data(json!({ "x": 1 })));
        assert_eq!(
            err,
            BridgeError::Remote {
                code: -32050,
                message: "nope".into(),
                data: Some(json!({ "x": 1 })),
            }
        );
        assert_eq!(err.to_string(), "nope (code -32050)");
    }
}
