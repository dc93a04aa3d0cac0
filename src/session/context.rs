//! Per-session connection context
//!
//! A [`ConnectionContext`] owns the protocol handler bound to one session and
//! the server→client push slot. Messages are delivered through an async mutex
//! around the handler, so a session processes its messages one at a time in
//! arrival order while other sessions run independently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::jsonrpc::{rpc_error_response, rpc_success, IncomingMessage, RequestId, RpcError};

/// Server-side protocol logic for a single session.
///
/// One instance is created per session and keeps whatever state the session
/// accumulates (negotiated version, client info, log level).
#[async_trait]
pub trait ProtocolHandler: Send {
    async fn handle_request(&mut self, method: &str, params: Value) -> Result<Value, RpcError>;

    async fn handle_notification(&mut self, method: &str, params: Value);

    /// Responses from the client to server-initiated requests.
    async fn handle_response(&mut self, id: RequestId, outcome: Result<Value, RpcError>) {
        debug!(%id, ok = outcome.is_ok(), "dropping unsolicited client response");
    }
}

/// Builds a fresh handler bound to a new session's peer.
pub type HandlerFactory = Arc<dyn Fn(SessionPeer) -> Box<dyn ProtocolHandler> + Send + Sync>;

/// Messages buffered for a push stream before new ones are dropped.
pub const PUSH_BUFFER: usize = 64;

/// Server→client half of a session, shared by the context and its handler.
#[derive(Clone)]
pub struct SessionPeer {
    session_id: Arc<str>,
    stream: Arc<Mutex<Option<mpsc::Sender<Value>>>>,
}

impl SessionPeer {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: Arc::from(session_id),
            stream: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Pushes a message onto the attached stream. Returns `false` when no
    /// stream is attached, the remote end has gone away, or the stream already
    /// holds [`PUSH_BUFFER`] unread messages.
    pub fn push(&self, message: Value) -> bool {
        let mut slot = self.stream.lock();
        let Some(tx) = slot.as_ref() else {
            debug!(session_id = %self.session_id, "no push stream attached; message dropped");
            return false;
        };
        match tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    session_id = %self.session_id,
                    capacity = PUSH_BUFFER,
                    "push stream full; message dropped"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                *slot = None;
                debug!(session_id = %self.session_id, "push stream closed by client");
                false
            }
        }
    }

    pub fn has_stream(&self) -> bool {
        self.stream.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Replaces any previous stream; the old receiver then ends.
    fn attach(&self) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(PUSH_BUFFER);
        *self.stream.lock() = Some(tx);
        rx
    }

    fn detach(&self) {
        self.stream.lock().take();
    }
}

pub struct ConnectionContext {
    peer: SessionPeer,
    created_at: DateTime<Utc>,
    closed: AtomicBool,
    handler: tokio::sync::Mutex<Box<dyn ProtocolHandler>>,
}

impl ConnectionContext {
    pub(crate) fn new(session_id: &str, factory: &HandlerFactory) -> Self {
        let peer = SessionPeer::new(session_id);
        let handler = factory(peer.clone());
        Self {
            peer,
            created_at: Utc::now(),
            closed: AtomicBool::new(false),
            handler: tokio::sync::Mutex::new(handler),
        }
    }

    pub fn session_id(&self) -> &str {
        self.peer.session_id()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn peer(&self) -> &SessionPeer {
        &self.peer
    }

    pub fn attach_stream(&self) -> mpsc::Receiver<Value> {
        debug!(session_id = %self.session_id(), "push stream attached");
        self.peer.attach()
    }

    /// Hands a decoded message to this session's handler and returns the
    /// reply envelope for requests.
    pub async fn deliver(&self, message: IncomingMessage) -> Option<Value> {
        let mut handler = self.handler.lock().await;
        match message {
            IncomingMessage::Request { id, method, params } => {
                let reply = match handler.handle_request(&method, params).await {
                    Ok(result) => rpc_success(id.into(), result),
                    Err(error) => {
                        debug!(
                            session_id = %self.session_id(),
                            method = %method,
                            code = error.code,
                            "request failed"
                        );
                        rpc_error_response(id.into(), error)
                    }
                };
                Some(reply)
            }
            IncomingMessage::Notification { method, params } => {
                handler.handle_notification(&method, params).await;
                None
            }
            IncomingMessage::Response { id, outcome } => {
                handler.handle_response(id, outcome).await;
                None
            }
            IncomingMessage::Unrecognized => None,
        }
    }

    /// Marks the context closed and drops its push stream. Returns `true`
    /// only for the call that performed the transition.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.peer.detach();
        true
    }
}
