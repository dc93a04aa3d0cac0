//! Shopping Cart State Management
//!
//! This module manages the application state shared by every MCP session:
//! cart storage and the widget bundle loader.

use super::models::CartItem;
use crate::widget::WidgetAssets;
use dashmap::DashMap;
use std::sync::Arc;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state that can be safely passed between threads
pub type SharedState = Arc<AppState>;

/// Core application state containing carts and asset information
pub struct AppState {
    /// In-memory storage for carts, keyed by cart_id.
    /// DashMap allows concurrent access without external Mutexes.
    pub carts: DashMap<String, Vec<CartItem>>,

    /// Loader for the HTML widget bundles.
    pub widgets: WidgetAssets,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(WidgetAssets::locate(None))
    }
}

impl AppState {
    /// Creates a new AppState with empty carts
    pub fn new(widgets: WidgetAssets) -> Self {
        Self {
            carts: DashMap::new(),
            widgets,
        }
    }

    /// Returns a snapshot of a cart's items, or an empty list.
    pub fn cart_items(&self, cart_id: &str) -> Vec<CartItem> {
        self.carts
            .get(cart_id)
            .map(|items| items.clone())
            .unwrap_or_default()
    }
}
