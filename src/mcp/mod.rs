//! Model Context Protocol (MCP) Module
//!
//! This module contains the MCP side of the cart app, including:
//! - Protocol models (method params, log levels, constants)
//! - Listing helpers (tools, resources, widget metadata)
//! - The per-session handler (initialize, tools/list, tools/call, etc.)

pub mod handlers;
pub mod helpers;
pub mod models;

// Re-export commonly used types and functions
pub use handlers::{handler_factory, McpHandler};
