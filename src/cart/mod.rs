//! Shopping Cart Domain Module
//!
//! This module contains all shopping cart business logic, including:
//! - Domain models (CartItem, tool inputs, quantity bounds)
//! - Business logic helpers (validation, cart operations, formatting)
//! - Application state management

pub mod helpers;
pub mod models;
pub mod state;

// Re-export commonly used types for convenience
pub use state::{AppState, SharedState};
