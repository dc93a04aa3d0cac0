//! Shopping Cart Business Logic Helpers
//!
//! This module contains helper functions for cart operations and formatting.

use super::models::{CartItem, MAX_ITEM_QUANTITY, MIN_ITEM_QUANTITY};
use crate::errors::ToolError;
use uuid::Uuid;

/// Returns the provided `cart_id` or creates a new UUID string when `None`.
///
/// This guarantees that every cart operation works with a non-empty identifier.
pub fn get_or_create_cart_id(cart_id: Option<String>) -> String {
    cart_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string())
}

/// Checks every incoming line before any cart is touched.
///
/// Names must be non-empty and quantities must lie within
/// `MIN_ITEM_QUANTITY..=MAX_ITEM_QUANTITY`.
pub fn validate_items(items: &[CartItem]) -> Result<(), ToolError> {
    if items.is_empty() {
        return Err(ToolError::Validation(
            "at least one item is required".to_string(),
        ));
    }
    for item in items {
        if item.name.trim().is_empty() {
            return Err(ToolError::Validation(
                "item name must not be empty".to_string(),
            ));
        }
        if !(MIN_ITEM_QUANTITY..=MAX_ITEM_QUANTITY).contains(&item.quantity) {
            return Err(ToolError::Validation(format!(
                "quantity for '{}' must be between {} and {}, got {}",
                item.name, MIN_ITEM_QUANTITY, MAX_ITEM_QUANTITY, item.quantity
            )));
        }
    }
    Ok(())
}

/// Merges `new_items` into `cart_items`, aggregating quantities for existing
/// entries and inserting brand new ones.
///
/// # Behaviour
///
/// * If an item with the same name already exists, its `quantity` is
///   increased by the incoming quantity (saturating).
/// * Extra fields (`extra` hashmap) are **not** merged; only the quantity is
///   updated.
///
/// This function mutates `cart_items` in-place.
pub fn update_cart_with_new_items(cart_items: &mut Vec<CartItem>, new_items: Vec<CartItem>) {
    for incoming in new_items {
        if let Some(existing) = cart_items.iter_mut().find(|i| i.name == incoming.name) {
            existing.quantity = existing.quantity.saturating_add(incoming.quantity);
        } else {
            cart_items.push(incoming);
        }
    }
}

/// Produces a human-readable one-line summary for a list of cart items.
///
/// Example output: `"2x Apple, 1x Banana"`.
pub fn format_item_summary(items: &[CartItem]) -> String {
    items
        .iter()
        .map(|i| format!("{}x {}", i.quantity, i.name))
        .collect::<Vec<_>>()
        .join(", ")
}
