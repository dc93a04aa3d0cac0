//! MCP Protocol Helpers
//!
//! This module contains helper functions for widget metadata construction and
//! the static tool/resource listings.

use serde_json::{json, Value};

use super::models::{CHECKOUT_TOOL_NAME, TOOL_NAME, WIDGET_MIME_TYPE, WIDGET_TEMPLATE_URI};
use crate::cart::models::{MAX_ITEM_QUANTITY, MIN_ITEM_QUANTITY};

/// Constructs the metadata that links tool results to the widget.
///
/// `ui.resourceUri` is read by MCP Apps hosts; the `openai/*` keys by hosts
/// built on the Apps SDK.
///
/// # Arguments
///
/// * `session_id` - Optional identifier to link tool calls to a specific widget session.
pub fn widget_meta(session_id: Option<&str>) -> Value {
    let mut meta = json!({
        "ui": { "resourceUri": WIDGET_TEMPLATE_URI },
        "openai/outputTemplate": WIDGET_TEMPLATE_URI,
        "openai/toolInvocation/invoking": "Preparing shopping cart",
        "openai/toolInvocation/invoked": "Shopping cart ready",
        "openai/widgetAccessible": true,
    });

    if let Some(id) = session_id {
        meta["openai/widgetSessionId"] = json!(id);
    }

    meta
}

/// Result of `tools/list`.
pub fn tools_list() -> Value {
    json!({
        "tools": [
            {
                "name": TOOL_NAME,
                "title": "Add items to cart",
                "description": "Adds the provided items to the active cart and returns its state.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "items": {
                            "type": "array",
                            "minItems": 1,
                            "items": {
                                "type": "object",
                                "required": ["name"],
                                "properties": {
                                    "name": { "type": "string" },
                                    "quantity": {
                                        "type": "integer",
                                        "default": 1,
                                        "minimum": MIN_ITEM_QUANTITY,
                                        "maximum": MAX_ITEM_QUANTITY
                                    }
                                },
                                "additionalProperties": true
                            }
                        },
                        "cartId": { "type": "string" }
                    },
                    "required": ["items"],
                    "additionalProperties": false
                },
                "_meta": widget_meta(None)
            },
            {
                "name": CHECKOUT_TOOL_NAME,
                "title": "Checkout",
                "description": "Checks out the current cart, clearing it and returning a receipt.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "cartId": { "type": "string" }
                    },
                    "additionalProperties": false
                },
                "_meta": widget_meta(None)
            }
        ]
    })
}

/// Result of `resources/list`.
pub fn resources_list() -> Value {
    json!({
        "resources": [{
            "name": "Start shopping cart",
            "uri": WIDGET_TEMPLATE_URI,
            "mimeType": WIDGET_MIME_TYPE,
            "_meta": widget_meta(None)
        }]
    })
}

/// Result of `resources/read` for the widget template.
pub fn widget_resource(html: String) -> Value {
    json!({
        "contents": [{
            "uri": WIDGET_TEMPLATE_URI,
            "mimeType": WIDGET_MIME_TYPE,
            "text": html,
            "_meta": widget_meta(None)
        }]
    })
}
