//! Request correlator for the widget side of the host channel

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use tokio::{
    sync::{oneshot, watch},
    time::timeout,
};
use tracing::{debug, info, trace, warn};

use super::{
    error::BridgeError,
    host_context::{merge_shallow, HostContext},
    models::*,
    subscriptions::{HandlerResult, NotificationHub, Subscription},
    transport::MessageTransport,
};
use crate::jsonrpc::{
    rpc_error_response, rpc_notification, rpc_request, rpc_success, IncomingMessage, RequestId,
    RpcError,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub app_info: AppInfo,
    pub request_timeout: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            app_info: AppInfo::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Initialized,
}

type Outcome = Result<Value, BridgeError>;

/// `None` until the handshake task settles.
type HandshakeOutcome = Option<Result<InitializeResult, BridgeError>>;

struct PendingRequest {
    method: String,
    waiter: oneshot::Sender<Outcome>,
}

/// Drops the pending entry when the awaiting future goes away, whatever the
/// reason.
struct PendingGuard<'a> {
    pending: &'a DashMap<u64, PendingRequest>,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

/// One per widget instance; share it by `Arc`.
pub struct AppBridge {
    transport: Box<dyn MessageTransport>,
    options: BridgeOptions,
    next_id: AtomicU64,
    pending: DashMap<u64, PendingRequest>,
    hub: Arc<NotificationHub>,
    state: Mutex<ConnectionState>,
    handshake: Mutex<Option<watch::Receiver<HandshakeOutcome>>>,
    host_context: RwLock<HostContext>,
    tool_input: RwLock<Option<Value>>,
    tool_result: RwLock<Option<Value>>,
    destroyed: AtomicBool,
}

impl AppBridge {
    pub fn new(transport: impl MessageTransport + 'static, options: BridgeOptions) -> Self {
        Self {
            transport: Box::new(transport),
            options,
            next_id: AtomicU64::new(1),
            pending: DashMap::new(),
            hub: NotificationHub::new(),
            state: Mutex::new(ConnectionState::Uninitialized),
            handshake: Mutex::new(None),
            host_context: RwLock::new(HostContext::default()),
            tool_input: RwLock::new(None),
            tool_result: RwLock::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn host_context(&self) -> HostContext {
        self.host_context.read().clone()
    }

    pub fn theme(&self) -> Option<String> {
        self.host_context.read().theme().map(str::to_string)
    }

    pub fn display_mode(&self) -> Option<String> {
        self.host_context.read().display_mode().map(str::to_string)
    }

    pub fn locale(&self) -> Option<String> {
        self.host_context.read().locale().map(str::to_string)
    }

    pub fn tool_input(&self) -> Option<Value> {
        self.tool_input.read().clone()
    }

    pub fn tool_result(&self) -> Option<Value> {
        self.tool_result.read().clone()
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    /// Performs the `ui/initialize` handshake.
    ///
    /// Every caller, concurrent or later, observes the outcome of the first
    /// attempt; the request and the `initialized` notification are sent once.
    /// The handshake runs on its own task, so a caller that stops waiting
    /// does not abandon it.
    pub async fn initialize(self: &Arc<Self>) -> Result<InitializeResult, BridgeError> {
        self.ensure_alive()?;
        let mut outcome = self.handshake_outcome();
        let result = {
            let settled = outcome.wait_for(Option::is_some).await.map_err(|_| {
                BridgeError::Transport("handshake task ended without an outcome".to_string())
            })?;
            (*settled).clone()
        };
        result.unwrap_or(Err(BridgeError::ClientDestroyed))
    }

    /// Returns the receiver of the handshake outcome, starting the handshake
    /// task on first use.
    fn handshake_outcome(self: &Arc<Self>) -> watch::Receiver<HandshakeOutcome> {
        let mut slot = self.handshake.lock();
        if let Some(receiver) = slot.as_ref() {
            return receiver.clone();
        }

        let (sender, receiver) = watch::channel(None);
        *self.state.lock() = ConnectionState::Initializing;
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = bridge.run_handshake().await;
            sender.send_replace(Some(outcome));
        });
        *slot = Some(receiver.clone());
        receiver
    }

    async fn run_handshake(&self) -> Result<InitializeResult, BridgeError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "appInfo": self.options.app_info,
            "appCapabilities": {}
        });
        let outcome = self
            .send_request(INITIALIZE, params)
            .await
            .and_then(|result| {
                serde_json::from_value::<InitializeResult>(result).map_err(|e| {
                    BridgeError::InvalidResponse {
                        method: INITIALIZE.to_string(),
                        reason: e.to_string(),
                    }
                })
            });

        match outcome {
            Ok(result) => {
                *self.host_context.write() = result.host_context.clone();
                *self.state.lock() = ConnectionState::Initialized;
                info!(protocol_version = %result.protocol_version, "bridge initialized");
                if let Err(err) = self.send_notification(INITIALIZED, json!({})) {
                    warn!(error = %err, "failed to post initialized notification");
                }
                Ok(result)
            }
            Err(err) => {
                *self.state.lock() = ConnectionState::Uninitialized;
                warn!(error = %err, "bridge handshake failed");
                Err(err)
            }
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Sends a request and waits for the matching response.
    pub async fn send_request(&self, method: &str, params: Value) -> Result<Value, BridgeError> {
        self.ensure_alive()?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (waiter, mut receiver) = oneshot::channel();
        self.pending.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                waiter,
            },
        );
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        // destroy() may have drained the map between the check and the insert.
        self.ensure_alive()?;

        trace!(id, method, "posting request");
        self.transport.post_message(rpc_request(id, method, params))?;

        let budget = self.options.request_timeout;
        match timeout(budget, &mut receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(BridgeError::ClientDestroyed),
            Err(_) if self.pending.remove(&id).is_some() => {
                warn!(id, method, timeout_ms = budget.as_millis() as u64, "request timed out");
                Err(BridgeError::RequestTimeout {
                    id,
                    method: method.to_string(),
                    timeout: budget,
                })
            }
            // Settled in the same instant the timer fired.
            Err(_) => receiver
                .await
                .unwrap_or_else(|_| Err(BridgeError::ClientDestroyed)),
        }
    }

    /// Fire-and-forget notification.
    pub fn send_notification(&self, method: &str, params: Value) -> Result<(), BridgeError> {
        self.ensure_alive()?;
        self.transport.post_message(rpc_notification(method, params))
    }

    pub async fn open_link(&self, url: &str) -> Result<Value, BridgeError> {
        self.send_request(OPEN_LINK, json!({ "url": url })).await
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, BridgeError> {
        self.send_request(CALL_TOOL, json!({ "name": name, "arguments": arguments }))
            .await
    }

    pub fn send_size_changed(&self, width: u32, height: u32) -> Result<(), BridgeError> {
        self.send_notification(SIZE_CHANGED, json!({ "width": width, "height": height }))
    }

    pub fn subscribe(
        &self,
        method: &str,
        handler: impl Fn(&Value) -> HandlerResult + Send + Sync + 'static,
    ) -> Subscription {
        self.hub.subscribe(method, handler)
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Handles one message received from the host. Messages without a
    /// JSON-RPC envelope are ignored.
    pub fn handle_message(&self, message: &Value) {
        if self.is_destroyed() {
            return;
        }

        match IncomingMessage::decode(message) {
            IncomingMessage::Response { id, outcome } => self.settle(id, outcome),
            IncomingMessage::Notification { method, params } => {
                self.apply_notification(&method, &params);
                self.hub.dispatch(&method, &params);
            }
            IncomingMessage::Request { id, method, .. } => self.answer_host_request(id, &method),
            IncomingMessage::Unrecognized => trace!("ignoring foreign message"),
        }
    }

    fn settle(&self, id: RequestId, outcome: Result<Value, RpcError>) {
        let pending = match &id {
            RequestId::Number(n) => u64::try_from(*n).ok().and_then(|n| self.pending.remove(&n)),
            RequestId::String(_) => None,
        };

        let Some((_, request)) = pending else {
            warn!(%id, "discarding response for unknown or expired request");
            return;
        };

        debug!(%id, method = %request.method, ok = outcome.is_ok(), "response received");
        // The caller may already be gone; nothing left to notify then.
        let _ = request.waiter.send(outcome.map_err(BridgeError::from));
    }

    /// Refreshes cached host state before subscribers see the notification.
    fn apply_notification(&self, method: &str, params: &Value) {
        match method {
            TOOL_INPUT => {
                *self.tool_input.write() = Some(tool_arguments(params));
            }
            TOOL_INPUT_PARTIAL => {
                let mut cached = self.tool_input.write();
                let mut merged = match cached.take() {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                merge_shallow(&mut merged, &tool_arguments(params));
                *cached = Some(Value::Object(merged));
            }
            TOOL_RESULT => {
                *self.tool_result.write() = Some(params.clone());
            }
            HOST_CONTEXT_CHANGED => {
                self.host_context.write().merge(params);
            }
            _ => {}
        }
    }

    fn answer_host_request(&self, id: RequestId, method: &str) {
        let reply = match method {
            PING => rpc_success(id.into(), json!({})),
            _ => {
                debug!(method, "host request not supported");
                rpc_error_response(id.into(), RpcError::method_not_found(method))
            }
        };
        if let Err(err) = self.transport.post_message(reply) {
            warn!(error = %err, "failed to answer host request");
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Rejects every pending request with [`BridgeError::ClientDestroyed`]
    /// and drops all subscriptions. Later sends fail without posting.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut rejected = 0usize;
        for id in ids {
            if let Some((_, request)) = self.pending.remove(&id) {
                let _ = request.waiter.send(Err(BridgeError::ClientDestroyed));
                rejected += 1;
            }
        }
        self.hub.clear();
        info!(rejected, "bridge destroyed");
    }

    fn ensure_alive(&self) -> Result<(), BridgeError> {
        if self.is_destroyed() {
            Err(BridgeError::ClientDestroyed)
        } else {
            Ok(())
        }
    }
}

/// Tool notifications carry `{arguments: {...}}`; bare objects are accepted
/// as the arguments themselves.
fn tool_arguments(params: &Value) -> Value {
    params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| params.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::transport::ChannelTransport;
    use parking_lot::Mutex as SyncMutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn bridge(timeout: Duration) -> (Arc<AppBridge>, UnboundedReceiver<Value>) {
        let (transport, outbound) = ChannelTransport::new();
        let options = BridgeOptions {
            request_timeout: timeout,
            ..BridgeOptions::default()
        };
        (Arc::new(AppBridge::new(transport, options)), outbound)
    }

    async fn next_request(outbound: &mut UnboundedReceiver<Value>) -> (u64, String) {
        let message = outbound.recv().await.expect("outbound message");
        (
            message["id"].as_u64().expect("request id"),
            message["method"].as_str().expect("method").to_string(),
        )
    }

    #[tokio::test]
    async fn initialize_caches_host_context_and_notifies_once() {
        let (bridge, mut outbound) = bridge(DEFAULT_REQUEST_TIMEOUT);

        let first = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.initialize().await }
        });
        let (id, method) = next_request(&mut outbound).await;
        assert_eq!(method, INITIALIZE);
        assert_eq!(bridge.state(), ConnectionState::Initializing);

        bridge.handle_message(&rpc_success(
            json!(id),
            json!({ "protocolVersion": "2025-01-01", "hostContext": { "theme": "dark" } }),
        ));
        let result = first.await.expect("join").expect("handshake");
        assert_eq!(result.protocol_version, "2025-01-01");
        assert_eq!(bridge.theme().as_deref(), Some("dark"));
        assert_eq!(bridge.state(), ConnectionState::Initialized);

        let initialized = outbound.recv().await.expect("initialized");
        assert_eq!(initialized["method"], INITIALIZED);
        assert!(initialized.get("id").is_none());

        let again = bridge.initialize().await.expect("memoized");
        assert_eq!(again, result);
        assert!(outbound.try_recv().is_err(), "nothing is resent");
    }

    /// Forwards requests to the host and rejects every notification.
    struct RequestsOnly(tokio::sync::mpsc::UnboundedSender<Value>);

    impl MessageTransport for RequestsOnly {
        fn post_message(&self, message: Value) -> Result<(), BridgeError> {
            if message.get("id").is_none() {
                return Err(BridgeError::Transport("notify failed".into()));
            }
            self.0
                .send(message)
                .map_err(|_| BridgeError::Transport("host gone".into()))
        }
    }

    #[tokio::test]
    async fn failed_initialized_notification_does_not_fail_handshake() {
        let (host, mut outbound) = tokio::sync::mpsc::unbounded_channel();
        let bridge = Arc::new(AppBridge::new(RequestsOnly(host), BridgeOptions::default()));

        let handshake = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.initialize().await }
        });
        let (id, _) = next_request(&mut outbound).await;
        bridge.handle_message(&rpc_success(
            json!(id),
            json!({ "protocolVersion": "2025-01-01", "hostContext": { "theme": "dark" } }),
        ));

        let result = handshake.await.expect("join").expect("handshake succeeds");
        assert_eq!(result.protocol_version, "2025-01-01");
        assert_eq!(bridge.state(), ConnectionState::Initialized);
        assert_eq!(bridge.theme().as_deref(), Some("dark"));
        assert!(bridge.initialize().await.is_ok());
    }

    #[tokio::test]
    async fn abandoned_initialize_keeps_the_handshake_running() {
        let (bridge, mut outbound) = bridge(DEFAULT_REQUEST_TIMEOUT);

        let abandoned = timeout(Duration::from_millis(10), bridge.initialize()).await;
        assert!(abandoned.is_err(), "no reply yet");
        assert_eq!(bridge.state(), ConnectionState::Initializing);
        let (id, method) = next_request(&mut outbound).await;
        assert_eq!(method, INITIALIZE);

        let second = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.initialize().await }
        });
        tokio::task::yield_now().await;
        bridge.handle_message(&rpc_success(
            json!(id),
            json!({ "protocolVersion": "2025-01-01" }),
        ));
        let result = second.await.expect("join").expect("handshake");
        assert_eq!(result.protocol_version, "2025-01-01");
        assert_eq!(bridge.state(), ConnectionState::Initialized);

        let initialized = outbound.recv().await.expect("initialized");
        assert_eq!(initialized["method"], INITIALIZED);
        assert!(outbound.try_recv().is_err(), "ui/initialize is posted once");
    }

    #[tokio::test]
    async fn concurrent_requests_get_distinct_increasing_ids() {
        let (bridge, mut outbound) = bridge(DEFAULT_REQUEST_TIMEOUT);

        let calls: Vec<_> = (0..16)
            .map(|i| {
                let bridge = bridge.clone();
                tokio::spawn(async move { bridge.send_request("echo", json!({ "i": i })).await })
            })
            .collect();

        let mut ids = Vec::new();
        for _ in 0..16 {
            let (id, _) = next_request(&mut outbound).await;
            ids.push(id);
        }
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, (1..=16).collect::<Vec<u64>>());

        for id in &ids {
            bridge.handle_message(&rpc_success(json!(id), json!(id)));
        }
        for call in calls {
            call.await.expect("join").expect("result");
        }
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn timeout_then_late_response_is_discarded() {
        let (bridge, mut outbound) = bridge(Duration::from_millis(20));

        let err = bridge
            .send_request("slow", Value::Null)
            .await
            .expect_err("must time out");
        let (id, _) = next_request(&mut outbound).await;
        assert_eq!(
            err,
            BridgeError::RequestTimeout {
                id,
                method: "slow".into(),
                timeout: Duration::from_millis(20),
            }
        );
        assert_eq!(bridge.pending_count(), 0);

        bridge.handle_message(&rpc_success(json!(id), json!("late")));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn error_responses_become_remote_errors() {
        let (bridge, mut outbound) = bridge(DEFAULT_REQUEST_TIMEOUT);

        let call = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.call_tool("add_to_cart", json!({ "items": [] })).await }
        });
        let (id, method) = next_request(&mut outbound).await;
        assert_eq!(method, CALL_TOOL);

        bridge.handle_message(&rpc_error_response(
            json!(id),
            RpcError::invalid_params("Validation error: empty"),
        ));
        let err = call.await.expect("join").expect_err("remote error");
        assert!(matches!(
            err,
            BridgeError::Remote { code: -32602, ref message, .. } if message == "Validation error: empty"
        ));
    }

    #[tokio::test]
    async fn destroy_rejects_pending_and_later_sends() {
        let (bridge, mut outbound) = bridge(DEFAULT_REQUEST_TIMEOUT);

        let calls: Vec<_> = (0..3)
            .map(|_| {
                let bridge = bridge.clone();
                tokio::spawn(async move { bridge.send_request("wait", Value::Null).await })
            })
            .collect();
        for _ in 0..3 {
            next_request(&mut outbound).await;
        }
        assert_eq!(bridge.pending_count(), 3);

        bridge.destroy();
        for call in calls {
            assert_eq!(call.await.expect("join"), Err(BridgeError::ClientDestroyed));
        }

        assert_eq!(
            bridge.send_request("after", Value::Null).await,
            Err(BridgeError::ClientDestroyed)
        );
        assert_eq!(
            bridge.send_notification("after", Value::Null),
            Err(BridgeError::ClientDestroyed)
        );
        assert!(outbound.try_recv().is_err(), "nothing posted after destroy");
    }

    #[tokio::test]
    async fn notifications_update_cache_before_fan_out() {
        let (bridge, _outbound) = bridge(DEFAULT_REQUEST_TIMEOUT);
        let seen = Arc::new(SyncMutex::new(Vec::new()));

        let _sub = bridge.subscribe(HOST_CONTEXT_CHANGED, {
            let seen = seen.clone();
            move |params: &Value| {
                seen.lock().push(params.clone());
                Ok(())
            }
        });

        for patch in [json!({ "a": 1 }), json!({ "b": 2 }), json!({ "a": 3 })] {
            bridge.handle_message(&rpc_notification(HOST_CONTEXT_CHANGED, patch));
        }
        assert_eq!(bridge.host_context().to_value(), json!({ "a": 3, "b": 2 }));
        assert_eq!(seen.lock().len(), 3);

        bridge.handle_message(&rpc_notification(
            TOOL_INPUT_PARTIAL,
            json!({ "arguments": { "items": [], "cartId": "c1" } }),
        ));
        bridge.handle_message(&rpc_notification(
            TOOL_INPUT_PARTIAL,
            json!({ "arguments": { "items": [{ "name": "Apple" }] } }),
        ));
        assert_eq!(
            bridge.tool_input(),
            Some(json!({ "items": [{ "name": "Apple" }], "cartId": "c1" }))
        );

        bridge.handle_message(&rpc_notification(
            TOOL_INPUT,
            json!({ "arguments": { "cartId": "c2" } }),
        ));
        assert_eq!(bridge.tool_input(), Some(json!({ "cartId": "c2" })));

        bridge.handle_message(&rpc_notification(TOOL_RESULT, json!({ "structuredContent": {} })));
        assert_eq!(bridge.tool_result(), Some(json!({ "structuredContent": {} })));
    }

    #[tokio::test]
    async fn foreign_messages_are_ignored() {
        let (bridge, mut outbound) = bridge(DEFAULT_REQUEST_TIMEOUT);

        bridge.handle_message(&json!({ "type": "webpackOk" }));
        bridge.handle_message(&json!({ "jsonrpc": "1.0", "method": "x" }));
        bridge.handle_message(&json!("hello"));

        assert!(outbound.try_recv().is_err());
        assert_eq!(bridge.host_context(), HostContext::default());
    }

    #[tokio::test]
    async fn host_requests_are_answered() {
        let (bridge, mut outbound) = bridge(DEFAULT_REQUEST_TIMEOUT);

        bridge.handle_message(&rpc_request(7u64, PING, Value::Null));
        let pong = outbound.recv().await.expect("ping reply");
        assert_eq!(pong["id"], 7);
        assert_eq!(pong["result"], json!({}));

        bridge.handle_message(&rpc_request(8u64, "ui/unknown", Value::Null));
        let reply = outbound.recv().await.expect("error reply");
        assert_eq!(reply["id"], 8);
        assert_eq!(reply["error"]["code"], crate::jsonrpc::METHOD_NOT_FOUND);
    }
}
