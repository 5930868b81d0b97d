//! API Handlers
//!
//! HTTP request handlers for the single-item and bulk storage endpoints.
//! Each handler validates its input, makes one store call and maps the
//! outcome to a status code and JSON body.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::{ApiError, Result};
use crate::models::{
    item_path, validate_items, validate_key, DeletedCountResponse, HealthResponse, ItemsProblem,
    KeysRequest, SetItemBody, SetItemQuery, SetItemsRequest, StoredListResponse, StoredResponse,
    ValueResponse,
};
use crate::store::{KvStore, Lookup};

/// Application state shared across all handlers.
///
/// Holds the process-wide store handle; cloning only bumps the Arc.
#[derive(Clone)]
pub struct AppState {
    /// Key-value backend
    pub store: Arc<dyn KvStore>,
}

impl AppState {
    /// Creates a new AppState owning the given store.
    pub fn new(store: impl KvStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Creates a new AppState from an already shared store.
    pub fn from_shared(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }
}

/// Handler for PUT /items/{key}
///
/// The value comes from the `value` query parameter, or from a JSON body
/// `{"value": ...}` when the query parameter is absent.
pub async fn set_item_handler(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
    query: std::result::Result<Query<SetItemQuery>, QueryRejection>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let Path(key) = path?;
    if let Some(msg) = validate_key(&key) {
        return Err(ApiError::InvalidRequest(msg));
    }

    let Query(query) = query?;
    let value = match query.value {
        Some(value) => Value::String(value),
        None if body.is_empty() => {
            return Err(ApiError::Unprocessable("Field required: value".to_string()))
        }
        None => {
            serde_json::from_slice::<SetItemBody>(&body)
                .map_err(|e| ApiError::Unprocessable(format!("Invalid request body: {}", e)))?
                .value
        }
    };

    let written = state.store.set(&key, &value).await?;
    if written != 1 {
        error!(
            "store.set({}, {}) returned {}. Expected 1",
            key, value, written
        );
        return Err(ApiError::UnexpectedWriteCount {
            key,
            observed: written,
        });
    }

    let location = location_header(&key)?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(StoredResponse::new(&key)),
    ))
}

/// Handler for GET /items/{key}
///
/// Answers 201 on success for compatibility with existing clients.
pub async fn get_item_handler(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(key) = path?;
    match state.store.get(&key).await? {
        Lookup::Found(value) => Ok((StatusCode::CREATED, Json(ValueResponse { value }))),
        Lookup::Absent => Err(ApiError::NotFound("Item not found".to_string())),
    }
}

/// Handler for DELETE /items/{key}
pub async fn delete_item_handler(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<StatusCode> {
    let Path(key) = path?;
    if state.store.delete(&key).await? == 0 {
        return Err(ApiError::NotFound("Item not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for PUT /bulk/items
///
/// Paths in the response follow the key order of the request object.
pub async fn set_items_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SetItemsRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(items) = payload?;

    match validate_items(&items) {
        Some(ItemsProblem::Empty) => {
            return Err(ApiError::InvalidRequest("No items specified".to_string()))
        }
        Some(ItemsProblem::InvalidKey(msg)) => return Err(ApiError::InvalidRequest(msg)),
        Some(ItemsProblem::NullValue(key)) => {
            return Err(ApiError::Unprocessable(format!(
                "Value for key '{}' cannot be null",
                key
            )))
        }
        None => {}
    }

    let pairs: Vec<(String, Value)> = items.into_iter().collect();
    state.store.multi_set(&pairs).await?;
    debug!("Stored {} items", pairs.len());

    Ok((
        StatusCode::CREATED,
        Json(StoredListResponse::new(pairs.iter().map(|(key, _)| key))),
    ))
}

/// Handler for GET /bulk/items
///
/// Missing keys map to `null`. A key requested twice appears once.
pub async fn get_items_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<KeysRequest>, JsonRejection>,
) -> Result<Json<Map<String, Value>>> {
    let Json(keys) = payload?;
    if keys.is_empty() {
        return Ok(Json(Map::new()));
    }

    let mut found = Map::with_capacity(keys.len());
    for (key, lookup) in state.store.multi_get(&keys).await? {
        found.insert(key, lookup.into_value_or_null());
    }
    Ok(Json(found))
}

/// Handler for DELETE /bulk/items
///
/// The count reflects entries the store actually removed, so repeated keys
/// are counted once.
pub async fn delete_items_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<KeysRequest>, JsonRejection>,
) -> Result<Json<DeletedCountResponse>> {
    let Json(keys) = payload?;

    let deleted_count = if keys.is_empty() {
        0
    } else {
        state.store.multi_delete(&keys).await?
    };

    if deleted_count == 0 {
        return Err(ApiError::NotFound("No items found".to_string()));
    }
    Ok(Json(DeletedCountResponse { deleted_count }))
}

/// Handler for GET /health
///
/// Healthy only when the store answers PING.
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    state.store.ping().await?;
    Ok(Json(HealthResponse::healthy()))
}

/// Fallback for unknown routes.
pub async fn not_found_handler() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

/// Builds the Location header for a key, percent-encoding bytes outside
/// visible ASCII.
fn location_header(key: &str) -> Result<HeaderValue> {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_graphic() && byte != b'%' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    HeaderValue::from_str(&item_path(&encoded))
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid key: {}", e)))
}
