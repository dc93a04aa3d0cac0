//! Session Module
//!
//! This module contains the server-side session layer, including:
//! - Connection contexts (per-session handler, push stream, closed flag)
//! - The session registry with its lifecycle hooks

pub mod context;
pub mod registry;

// Re-export commonly used types for convenience
pub use context::{ConnectionContext, HandlerFactory, ProtocolHandler, SessionPeer};
pub use registry::{SessionHooks, SessionRegistry};
