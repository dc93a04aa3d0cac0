//! Guest↔host method names and handshake payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::host_context::HostContext;

pub const INITIALIZE: &str = "ui/initialize";
pub const INITIALIZED: &str = "ui/notifications/initialized";
pub const TOOL_INPUT: &str = "ui/notifications/tool-input";
pub const TOOL_INPUT_PARTIAL: &str = "ui/notifications/tool-input-partial";
pub const TOOL_RESULT: &str = "ui/notifications/tool-result";
pub const HOST_CONTEXT_CHANGED: &str = "ui/notifications/host-context-changed";
pub const SIZE_CHANGED: &str = "ui/notifications/size-changed";
pub const OPEN_LINK: &str = "ui/open-link";
pub const CALL_TOOL: &str = "tools/call";
pub const PING: &str = "ping";

/// Protocol version the guest asks for in `ui/initialize`.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Identifies the widget to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "shopping-cart-widget".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Host reply to `ui/initialize`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,

    #[serde(default)]
    pub host_context: HostContext,

    #[serde(default)]
    pub host_capabilities: Value,

    #[serde(default)]
    pub host_info: Option<Value>,
}
