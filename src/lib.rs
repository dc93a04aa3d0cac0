//! Shopping Cart App Server
//!
//! This library provides an MCP (Model Context Protocol) server for the
//! shopping cart widget, the session layer that multiplexes concurrent
//! clients over streamable HTTP, and the guest-side bridge the embedded
//! widget uses to talk back to its host.

// Domain modules
pub mod cart;
pub mod mcp;
pub mod widget;

// Protocol plumbing
pub mod bridge;
pub mod jsonrpc;
pub mod session;
pub mod transport;

// Infrastructure
pub mod config;
pub mod errors;
pub mod logging;
pub mod router;
