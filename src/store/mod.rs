//! Store Module
//!
//! Adapter layer between the HTTP handlers and the key-value backend.
//!
//! Every backend implements [`KvStore`], which normalizes the raw store
//! replies into written counts, [`Lookup`] results and removed counts.

mod memory;
mod redis;
pub mod resp;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use redis::RedisStore;

// == Store Error ==
/// Failures raised by a store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Socket level failure while talking to the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection could not be established or was closed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Reply could not be decoded or had an unexpected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Store answered with an error reply
    #[error("Server error: {0}")]
    Server(String),

    /// Value could not be encoded for storage
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Lookup ==
/// Outcome of a single-key read.
///
/// `Found(Value::Null)` is a stored null and is distinct from `Absent`.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Key is present with the given value
    Found(Value),
    /// Key is not present
    Absent,
}

impl Lookup {
    /// Returns the stored value, or JSON `null` when absent.
    pub fn into_value_or_null(self) -> Value {
        match self {
            Lookup::Found(value) => value,
            Lookup::Absent => Value::Null,
        }
    }

    /// Returns true when the key was not present in the store.
    pub fn is_absent(&self) -> bool {
        matches!(self, Lookup::Absent)
    }
}

// == KvStore Trait ==
/// Primitives the HTTP layer needs from a key-value backend.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Writes one entry and returns the number of entries written.
    async fn set(&self, key: &str, value: &Value) -> StoreResult<u64>;

    /// Reads one entry.
    async fn get(&self, key: &str) -> StoreResult<Lookup>;

    /// Removes one entry and returns the number of entries removed.
    async fn delete(&self, key: &str) -> StoreResult<u64>;

    /// Writes several entries. Not guaranteed to be atomic across keys.
    async fn multi_set(&self, pairs: &[(String, Value)]) -> StoreResult<()>;

    /// Reads several entries, returning each requested key with its lookup
    /// result in request order.
    async fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<(String, Lookup)>>;

    /// Removes several entries in one round trip and returns how many
    /// existed. An empty key list returns 0 without contacting the store.
    async fn multi_delete(&self, keys: &[String]) -> StoreResult<u64>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> StoreResult<()>;
}
