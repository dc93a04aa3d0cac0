//! HTTP bindings for the session transport
//!
//! `POST` delivers one JSON-RPC message, `GET` opens the server-sent event
//! push stream and `DELETE` terminates the session. Every successful reply
//! carries the session id in the [`SESSION_HEADER`] header.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Json, Router,
};
use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::errors::AppError;
use crate::router::ServerState;

pub const SESSION_HEADER: &str = "mcp-session-id";

/// Creates routes for the streamable HTTP endpoint
pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handle_post).get(handle_stream).delete(handle_delete))
        .route("/mcp", post(handle_post).get(handle_stream).delete(handle_delete)) // Standard endpoint
        .route("/mcp/", post(handle_post).get(handle_stream).delete(handle_delete)) // Trailing slash safety
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn with_session_header(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

/// Endpoint: POST /mcp
/// Requests are answered inline; notifications and responses are accepted
/// with an empty body.
async fn handle_post(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let outcome = state
        .transport
        .handle_post(session_id(&headers), &body)
        .await?;

    let response = match outcome.reply {
        Some(reply) => (StatusCode::OK, Json(reply)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    Ok(with_session_header(response, &outcome.session_id))
}

/// Endpoint: GET /mcp
/// Opens the server→client push stream for a known session.
async fn handle_stream(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let (context, receiver) = state.transport.open_stream(session_id(&headers))?;

    let events = ReceiverStream::new(receiver)
        .map(|message| Event::default().event("message").json_data(message));
    let response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();

    debug!(session_id = %context.session_id(), "push stream opened");
    Ok(with_session_header(response, context.session_id()))
}

/// Endpoint: DELETE /mcp
async fn handle_delete(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    state.transport.terminate(session_id(&headers))?;
    Ok(StatusCode::OK)
}
