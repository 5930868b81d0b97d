//! Request and Response models for the storage API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    validate_items, validate_key, ItemsProblem, KeysRequest, SetItemBody, SetItemQuery,
    SetItemsRequest,
};
pub use responses::{
    item_path, DeletedCountResponse, ErrorResponse, HealthResponse, StoredListResponse,
    StoredResponse, ValueResponse,
};
