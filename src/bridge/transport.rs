//! Outbound message transports and the inbound pump

use std::sync::Arc;

use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use super::{client::AppBridge, error::BridgeError};

/// Posts one serialized JSON-RPC message towards the host.
///
/// Posting never waits for a reply; correlation happens in [`AppBridge`].
pub trait MessageTransport: Send + Sync {
    fn post_message(&self, message: Value) -> Result<(), BridgeError>;
}

/// In-process transport backed by an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Value>,
}

impl ChannelTransport {
    /// Returns the transport and the receiving end the host reads from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        (Self { outbound }, receiver)
    }
}

impl MessageTransport for ChannelTransport {
    fn post_message(&self, message: Value) -> Result<(), BridgeError> {
        self.outbound
            .send(message)
            .map_err(|_| BridgeError::Transport("host channel closed".to_string()))
    }
}

/// Feeds every message from `inbound` into the bridge until the channel
/// closes or the bridge is destroyed.
pub fn spawn_inbound_pump(
    bridge: Arc<AppBridge>,
    mut inbound: mpsc::UnboundedReceiver<Value>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            if bridge.is_destroyed() {
                break;
            }
            bridge.handle_message(&message);
        }
        debug!("bridge inbound pump stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::client::BridgeOptions;
    use crate::jsonrpc::rpc_success;
    use serde_json::json;

    #[tokio::test]
    async fn pump_feeds_host_messages_into_the_bridge() {
        let (transport, mut outbound) = ChannelTransport::new();
        let bridge = Arc::new(AppBridge::new(transport, BridgeOptions::default()));
        let (host, inbound) = mpsc::unbounded_channel();
        let pump = spawn_inbound_pump(bridge.clone(), inbound);

        let call = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.open_link("https://example.com").await }
        });
        let request = outbound.recv().await.expect("request");
        assert_eq!(request["method"], "ui/open-link");
        assert_eq!(request["params"]["url"], "https://example.com");

        host.send(rpc_success(request["id"].clone(), json!({})))
            .expect("send");
        assert_eq!(call.await.expect("join"), Ok(json!({})));

        drop(host);
        pump.await.expect("pump");
    }

    #[test]
    fn closed_host_channel_is_a_transport_error() {
        let (transport, outbound) = ChannelTransport::new();
        drop(outbound);
        assert!(matches!(
            transport.post_message(json!({})),
            Err(BridgeError::Transport(_))
        ));
    }
}
