//! Guest-side JSON-RPC bridge
//!
//! The widget embedded in a host talks to it through an [`AppBridge`]:
//! outbound requests are correlated with their responses by id, inbound
//! notifications fan out to subscribers, and the host context and latest
//! tool data are cached along the way.

pub mod client;
pub mod error;
pub mod host_context;
pub mod models;
pub mod subscriptions;
pub mod transport;

pub use client::{AppBridge, BridgeOptions, ConnectionState};
pub use error::BridgeError;
pub use host_context::HostContext;
pub use models::{AppInfo, InitializeResult};
pub use subscriptions::{HandlerResult, NotificationHub, Subscription};
pub use transport::{spawn_inbound_pump, ChannelTransport, MessageTransport};
