//! API Routes
//!
//! Configures the Axum router with all storage endpoints.

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_item_handler, delete_items_handler, get_item_handler, get_items_handler,
    health_handler, not_found_handler, set_item_handler, set_items_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /items/:key` - Store one item
/// - `GET /items/:key` - Retrieve one item
/// - `DELETE /items/:key` - Delete one item
/// - `PUT /bulk/items` - Store several items
/// - `GET /bulk/items` - Retrieve several items
/// - `DELETE /bulk/items` - Delete several items
/// - `GET /health` - Health check endpoint
///
/// Unknown paths answer 404 `{"detail": "Not Found"}`.
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/items/:key",
            put(set_item_handler)
                .get(get_item_handler)
                .delete(delete_item_handler),
        )
        .route(
            "/bulk/items",
            put(set_items_handler)
                .get(get_items_handler)
                .delete(delete_items_handler),
        )
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
