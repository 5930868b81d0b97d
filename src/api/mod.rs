//! API Module
//!
//! HTTP handlers and routing for the storage REST API.
//!
//! # Endpoints
//! - `PUT|GET|DELETE /items/:key` - Single item CRUD
//! - `PUT|GET|DELETE /bulk/items` - Bulk CRUD
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;


pub use handlers::*;
pub use routes::create_router;
