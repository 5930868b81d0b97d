//! Request DTOs for the storage API
//!
//! Defines the structure of incoming query strings and request bodies.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Query string for PUT /items/{key}
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetItemQuery {
    /// Value passed as `?value=...`, stored as a JSON string
    #[serde(default)]
    pub value: Option<String>,
}

/// JSON body for PUT /items/{key} when no `value` query is given
#[derive(Debug, Clone, Deserialize)]
pub struct SetItemBody {
    /// Any JSON value
    pub value: Value,
}

/// JSON body for PUT /bulk/items, keys in insertion order
pub type SetItemsRequest = Map<String, Value>;

/// JSON body for GET and DELETE /bulk/items
pub type KeysRequest = Vec<String>;

/// Validates a key before it is written.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    None
}

/// Validates a bulk write payload.
///
/// Returns the first problem found, None if valid.
pub fn validate_items(items: &SetItemsRequest) -> Option<ItemsProblem> {
    if items.is_empty() {
        return Some(ItemsProblem::Empty);
    }
    for (key, value) in items {
        if let Some(msg) = validate_key(key) {
            return Some(ItemsProblem::InvalidKey(msg));
        }
        if value.is_null() {
            return Some(ItemsProblem::NullValue(key.clone()));
        }
    }
    None
}

/// Reasons a bulk write payload is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemsProblem {
    /// No items at all
    Empty,
    /// A key failed [`validate_key`]
    InvalidKey(String),
    /// The value for this key is `null`
    NullValue(String),
}
