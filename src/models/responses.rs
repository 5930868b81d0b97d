//! Response DTOs for the storage API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

/// Path under which a single item is addressed.
pub fn item_path(key: &str) -> String {
    format!("/items/{}", key)
}

/// Response body for PUT /items/{key}
#[derive(Debug, Clone, Serialize)]
pub struct StoredResponse {
    /// Path of the stored item
    pub stored: String,
}

impl StoredResponse {
    pub fn new(key: &str) -> Self {
        Self {
            stored: item_path(key),
        }
    }
}

/// Response body for PUT /bulk/items
#[derive(Debug, Clone, Serialize)]
pub struct StoredListResponse {
    /// Paths of the stored items, in request order
    pub stored: Vec<String>,
}

impl StoredListResponse {
    pub fn new<'a>(keys: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            stored: keys.into_iter().map(|key| item_path(key)).collect(),
        }
    }
}

/// Response body for GET /items/{key}
#[derive(Debug, Clone, Serialize)]
pub struct ValueResponse {
    /// The stored value
    pub value: Value,
}

/// Response body for DELETE /bulk/items
#[derive(Debug, Clone, Serialize)]
pub struct DeletedCountResponse {
    /// Number of entries that existed and were removed
    pub deleted_count: u64,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Message describing what went wrong
    pub detail: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
