//! MCP (Model Context Protocol) session handler
//!
//! One [`McpHandler`] is bound to each session. It keeps the session's
//! negotiated protocol version, client info and log level, dispatches MCP
//! methods, and pushes log notifications over the session's stream.
//! `handle_tool_call` is public to make it accessible for tests.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::{helpers::*, models::*};
use crate::cart::{helpers::*, models::*, state::*};
use crate::errors::ToolError;
use crate::jsonrpc::{rpc_notification, RpcError};
use crate::session::{HandlerFactory, ProtocolHandler, SessionPeer};

/// Builds a handler factory that binds every new session to `state`.
pub fn handler_factory(state: SharedState) -> HandlerFactory {
    Arc::new(move |peer: SessionPeer| {
        Box::new(McpHandler::new(state.clone(), peer)) as Box<dyn ProtocolHandler>
    })
}

pub struct McpHandler {
    state: SharedState,
    peer: SessionPeer,
    protocol_version: Option<&'static str>,
    client_info: Option<Value>,
    client_ready: bool,
    log_level: LogLevel,
}

impl McpHandler {
    pub fn new(state: SharedState, peer: SessionPeer) -> Self {
        Self {
            state,
            peer,
            protocol_version: None,
            client_info: None,
            client_ready: false,
            log_level: LogLevel::Info,
        }
    }

    pub fn protocol_version(&self) -> Option<&'static str> {
        self.protocol_version
    }

    pub fn is_client_ready(&self) -> bool {
        self.client_ready
    }

    // =========================================================================
    // MCP Method Handlers
    // =========================================================================

    /// Handles `initialize` request (Handshake).
    fn initialize(&mut self, params: Value) -> Result<Value, RpcError> {
        if self.protocol_version.is_some() {
            return Err(RpcError::invalid_request("Server already initialized"));
        }
        let params: InitializeParams = parse_params(params)?;
        let version = negotiate_protocol_version(&params.protocol_version);
        self.protocol_version = Some(version);
        self.client_info = params.client_info;

        info!(
            session_id = %self.peer.session_id(),
            requested = %params.protocol_version,
            negotiated = version,
            client = ?self.client_info,
            "session initialized"
        );

        Ok(json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "logging": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        }))
    }

    /// Handles `resources/read` request.
    async fn read_resource(&self, params: Value) -> Result<Value, RpcError> {
        let params: ReadResourceParams = parse_params(params)?;
        if params.uri != WIDGET_TEMPLATE_URI {
            return Err(RpcError::invalid_params(format!(
                "Unknown resource: {}",
                params.uri
            )));
        }
        let html = self.state.widgets.load(WIDGET_NAME).await;
        Ok(widget_resource(html))
    }

    /// Handles `logging/setLevel` request.
    fn set_log_level(&mut self, params: Value) -> Result<Value, RpcError> {
        let params: SetLevelParams = parse_params(params)?;
        self.log_level = params.level;
        debug!(session_id = %self.peer.session_id(), level = ?params.level, "log level set");
        Ok(json!({}))
    }

    /// Handles `tools/call` request and reports the outcome on the session's
    /// push stream.
    fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let params: ToolCallParams = parse_params(params)?;
        match handle_tool_call(&self.state, &params.name, params.arguments) {
            Ok(result) => {
                let summary = result["content"][0]["text"].clone();
                self.notify_log(
                    LogLevel::Info,
                    json!({ "tool": params.name, "summary": summary }),
                );
                Ok(result)
            }
            Err(err) => {
                self.notify_log(
                    LogLevel::Warning,
                    json!({ "tool": params.name, "error": err.to_string() }),
                );
                Err(err.into())
            }
        }
    }

    /// Sends a `notifications/message` record when `level` passes the
    /// session's threshold.
    fn notify_log(&self, level: LogLevel, data: Value) {
        if level < self.log_level {
            return;
        }
        self.peer.push(rpc_notification(
            "notifications/message",
            json!({ "level": level, "logger": SERVER_NAME, "data": data }),
        ));
    }
}

#[async_trait]
impl ProtocolHandler for McpHandler {
    async fn handle_request(&mut self, method: &str, params: Value) -> Result<Value, RpcError> {
        debug!(session_id = %self.peer.session_id(), method, "MCP call");

        // Dispatch Method
        match method {
            "initialize" => self.initialize(params),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list()),
            "tools/call" => self.call_tool(params),
            "resources/list" => Ok(resources_list()),
            "resources/read" => self.read_resource(params).await,
            "logging/setLevel" => self.set_log_level(params),
            _ => {
                debug!(session_id = %self.peer.session_id(), method, "unknown method");
                Err(RpcError::method_not_found(method))
            }
        }
    }

    async fn handle_notification(&mut self, method: &str, _params: Value) {
        match method {
            "notifications/initialized" => {
                self.client_ready = true;
                debug!(session_id = %self.peer.session_id(), "client ready");
            }
            _ => debug!(session_id = %self.peer.session_id(), method, "ignoring notification"),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(format!("Invalid params: {e}")))
}

// =============================================================================
// Tool Implementations
// =============================================================================

/// Handles `tools/call` request (Business Logic).
pub fn handle_tool_call(state: &AppState, name: &str, args: Value) -> Result<Value, ToolError> {
    match name {
        TOOL_NAME => handle_add_to_cart_tool(state, args),
        CHECKOUT_TOOL_NAME => handle_checkout_tool(state, args),
        _ => Err(ToolError::UnknownTool(name.to_string())),
    }
}

/// Handles the add_to_cart tool functionality
fn handle_add_to_cart_tool(state: &AppState, args: Value) -> Result<Value, ToolError> {
    let input: AddToCartInput =
        serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

    // Reject the whole call before touching any cart.
    validate_items(&input.items)?;

    let cart_id = get_or_create_cart_id(input.cart_id);

    let current_items = {
        let mut cart_items = state.carts.entry(cart_id.clone()).or_default();
        update_cart_with_new_items(&mut cart_items, input.items);
        cart_items.clone()
    };
    let message = format!("Cart {} now has {} item(s).", cart_id, current_items.len());

    Ok(json!({
        "content": [{ "type": "text", "text": message }],
        "structuredContent": {
            "cartId": cart_id,
            "items": current_items
        },
        "_meta": widget_meta(Some(&cart_id))
    }))
}

/// Handles the checkout tool functionality
fn handle_checkout_tool(state: &AppState, args: Value) -> Result<Value, ToolError> {
    let input: CheckoutInput =
        serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

    let cart_id = get_or_create_cart_id(input.cart_id);

    // Remove the cart from the state to clear it
    let message = match state.carts.remove(&cart_id) {
        Some((_, items)) if !items.is_empty() => {
            let message = format!("Checked out now: {}", format_item_summary(&items));
            info!(cart_id = %cart_id, items = items.len(), "cart checked out");
            message
        }
        _ => "Cart is empty.".to_string(),
    };

    Ok(json!({
        "content": [{ "type": "text", "text": message }],
        "structuredContent": {
            "cartId": cart_id,
            "items": [],
            "checkout": true
        },
        "_meta": widget_meta(Some(&cart_id))
    }))
}
