//! MCP Protocol Models and Constants
//!
//! This module contains all data structures and constants related to the
//! Model Context Protocol (MCP) specification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// MCP Constants
// =============================================================================

/// Name of the primary tool for adding items to a cart
pub const TOOL_NAME: &str = "add_to_cart";
/// Name of the checkout tool
pub const CHECKOUT_TOOL_NAME: &str = "checkout";
/// Name of the widget bundle on disk
pub const WIDGET_NAME: &str = "shopping-cart";
/// URI for the widget template
pub const WIDGET_TEMPLATE_URI: &str = "ui://widget/shopping-cart.html";
/// MIME type for the widget
pub const WIDGET_MIME_TYPE: &str = "text/html;profile=mcp-app";
/// Server identifier
pub const SERVER_NAME: &str = "shopping-cart-rust";
/// Protocol versions this server speaks, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

// =============================================================================
// MCP Protocol Models
// =============================================================================

/// Params of an `initialize` request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,

    #[serde(default)]
    pub capabilities: Value,

    #[serde(default)]
    pub client_info: Option<Value>,
}

/// Params of a `tools/call` request
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,

    #[serde(default)]
    pub arguments: Value,
}

/// Params of a `resources/read` request
#[derive(Debug, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

/// Params of a `logging/setLevel` request
#[derive(Debug, Deserialize)]
pub struct SetLevelParams {
    pub level: LogLevel,
}

/// Syslog-style severities used by `notifications/message`, least severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

/// Picks the client's version when supported, otherwise the newest we know.
pub fn negotiate_protocol_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|supported| *supported == requested)
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}
