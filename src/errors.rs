//! Error types surfaced at the HTTP and tool boundaries.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::jsonrpc::{
    rpc_error, RpcError, INVALID_PARAMS, INVALID_REQUEST, NO_VALID_SESSION, PARSE_ERROR,
    SESSION_NOT_FOUND,
};

/// Transport-level failures. None of these mutate the session registry.
#[derive(Debug, Error)]
pub enum AppError {
    /// POST without a usable session: no id on a non-initialize message, or
    /// an id naming no live session.
    #[error("Bad Request: No valid session ID provided")]
    InvalidSession,
    /// GET/DELETE against a missing or unknown session id.
    #[error("Session not found")]
    SessionNotFound,
    #[error("Parse error")]
    Parse { detail: String },
    #[error("Invalid Request")]
    InvalidRequest,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidSession | Self::Parse { .. } | Self::InvalidRequest => {
                StatusCode::BAD_REQUEST
            }
            Self::SessionNotFound => StatusCode::NOT_FOUND,
        }
    }

    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::InvalidSession => NO_VALID_SESSION,
            Self::SessionNotFound => SESSION_NOT_FOUND,
            Self::Parse { .. } => PARSE_ERROR,
            Self::InvalidRequest => INVALID_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Parse { detail } = &self {
            tracing::debug!(error = %detail, "rejecting malformed JSON body");
        }
        let body = rpc_error(Value::Null, self.rpc_code(), self.to_string());
        (self.status(), Json(body)).into_response()
    }
}

/// Failures of a `tools/call` invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    /// Input parsed but lies outside the tool's declared bounds.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl ToolError {
    fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Validation(_) => "validation",
        }
    }
}

impl From<ToolError> for RpcError {
    fn from(err: ToolError) -> Self {
        RpcError::new(INVALID_PARAMS, err.to_string()).with_data(json!({ "kind": err.kind() }))
    }
}
