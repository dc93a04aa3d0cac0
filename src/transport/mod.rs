//! Streamable HTTP transport
//!
//! Decides, per inbound message, whether it belongs to an existing session,
//! starts a new one, or is rejected. Client→server traffic arrives as POST
//! bodies; server→client traffic flows over a push stream opened with GET.
//! The HTTP bindings live in [`http`].

pub mod http;

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::jsonrpc::IncomingMessage;
use crate::session::{ConnectionContext, HandlerFactory, SessionRegistry};

pub use http::{routes, SESSION_HEADER};

/// Method that bootstraps a session.
pub const INITIALIZE_METHOD: &str = "initialize";

/// Result of routing one POSTed message.
#[derive(Debug)]
pub struct PostOutcome {
    pub session_id: String,
    /// JSON-RPC response for requests; `None` for notifications and responses.
    pub reply: Option<Value>,
    pub created: bool,
}

pub struct SessionTransport {
    registry: Arc<SessionRegistry>,
    factory: HandlerFactory,
}

impl SessionTransport {
    pub fn new(registry: Arc<SessionRegistry>, factory: HandlerFactory) -> Self {
        Self { registry, factory }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Routes one POSTed JSON-RPC message.
    pub async fn handle_post(
        &self,
        session_id: Option<&str>,
        body: &[u8],
    ) -> Result<PostOutcome, AppError> {
        let payload: Value = serde_json::from_slice(body).map_err(|e| AppError::Parse {
            detail: e.to_string(),
        })?;
        let message = IncomingMessage::decode(&payload);

        let (context, created) = match session_id {
            Some(id) => match self.live_session(id) {
                Some(context) => (context, false),
                None => {
                    warn!(session_id = id, "message for unknown session rejected");
                    return Err(AppError::InvalidSession);
                }
            },
            None if is_initialize_request(&message) => (self.registry.create(&self.factory), true),
            None => {
                debug!(method = ?message.method(), "message without session rejected");
                return Err(AppError::InvalidSession);
            }
        };

        if matches!(message, IncomingMessage::Unrecognized) {
            return Err(AppError::InvalidRequest);
        }

        let reply = context.deliver(message).await;
        Ok(PostOutcome {
            session_id: context.session_id().to_string(),
            reply,
            created,
        })
    }

    /// Attaches a push stream to a known session.
    pub fn open_stream(
        &self,
        session_id: Option<&str>,
    ) -> Result<(Arc<ConnectionContext>, mpsc::Receiver<Value>), AppError> {
        let context = session_id
            .and_then(|id| self.live_session(id))
            .ok_or(AppError::SessionNotFound)?;
        let stream = context.attach_stream();
        Ok((context, stream))
    }

    /// Tears down a known session.
    pub fn terminate(&self, session_id: Option<&str>) -> Result<(), AppError> {
        let id = session_id.ok_or(AppError::SessionNotFound)?;
        self.registry
            .remove(id)
            .map(|_| ())
            .ok_or(AppError::SessionNotFound)
    }

    /// Closes every session; used on server shutdown.
    pub fn shutdown(&self) -> usize {
        self.registry.close_all()
    }

    fn live_session(&self, session_id: &str) -> Option<Arc<ConnectionContext>> {
        self.registry
            .get(session_id)
            .filter(|context| !context.is_closed())
    }
}

/// A well-formed `initialize` request: it carries an id and a params object
/// naming the client's protocol version.
pub fn is_initialize_request(message: &IncomingMessage) -> bool {
    match message {
        IncomingMessage::Request { method, params, .. } => {
            method == INITIALIZE_METHOD
                && params
                    .get("protocolVersion")
                    .is_some_and(Value::is_string)
        }
        _ => false,
    }
}
