//! REST Storage - HTTP facade over a Redis key-value store
//!
//! Exposes single-item and bulk CRUD endpoints and maps store outcomes to
//! HTTP status codes and JSON bodies.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use api::AppState;
pub use config::Config;
pub use store::{KvStore, Lookup, MemoryStore, RedisStore};
