//! In-memory store
//!
//! HashMap-backed [`KvStore`] used for tests and local runs without Redis.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::store::{KvStore, Lookup, StoreResult};

// == Memory Store ==
/// Key-value storage held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true when no entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set(&self, key: &str, value: &Value) -> StoreResult<u64> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(1)
    }

    async fn get(&self, key: &str) -> StoreResult<Lookup> {
        Ok(match self.entries.read().await.get(key) {
            Some(value) => Lookup::Found(value.clone()),
            None => Lookup::Absent,
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        Ok(u64::from(self.entries.write().await.remove(key).is_some()))
    }

    async fn multi_set(&self, pairs: &[(String, Value)]) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        for (key, value) in pairs {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<(String, Lookup)>> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .map(|key| {
                let lookup = match entries.get(key) {
                    Some(value) => Lookup::Found(value.clone()),
                    None => Lookup::Absent,
                };
                (key.clone(), lookup)
            })
            .collect())
    }

    async fn multi_delete(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        // Repeated keys are only removed once, matching DEL.
        let mut entries = self.entries.write().await;
        let removed = keys
            .iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_set_and_get() {
        let store = MemoryStore::new();

        assert_eq!(store.set("key1", &json!("value1")).await.unwrap(), 1);
        assert_eq!(
            store.get("key1").await.unwrap(),
            Lookup::Found(json!("value1"))
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_get_missing() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), Lookup::Absent);
    }

    #[tokio::test]
    async fn test_memory_stored_null() {
        let store = MemoryStore::new();
        store.set("nothing", &Value::Null).await.unwrap();

        assert_eq!(
            store.get("nothing").await.unwrap(),
            Lookup::Found(Value::Null)
        );
    }

    #[tokio::test]
    async fn test_memory_overwrite() {
        let store = MemoryStore::new();
        store.set("key1", &json!("value1")).await.unwrap();
        store.set("key1", &json!({"nested": [1, 2]})).await.unwrap();

        assert_eq!(
            store.get("key1").await.unwrap(),
            Lookup::Found(json!({"nested": [1, 2]}))
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_delete() {
        let store = MemoryStore::new();
        store.set("key1", &json!("value1")).await.unwrap();

        assert_eq!(store.delete("key1").await.unwrap(), 1);
        assert_eq!(store.delete("key1").await.unwrap(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_multi_get_keeps_request_order() {
        let store = MemoryStore::new();
        let pairs = vec![
            ("a".to_string(), json!(1)),
            ("b".to_string(), json!(2)),
        ];
        store.multi_set(&pairs).await.unwrap();

        let keys = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let fetched = store.multi_get(&keys).await.unwrap();

        assert_eq!(
            fetched,
            vec![
                ("b".to_string(), Lookup::Found(json!(2))),
                ("missing".to_string(), Lookup::Absent),
                ("a".to_string(), Lookup::Found(json!(1))),
            ]
        );
    }

    #[tokio::test]
    async fn test_memory_multi_delete_counts_distinct() {
        let store = MemoryStore::new();
        store.set("k", &json!("v")).await.unwrap();

        let keys = vec!["k".to_string(), "k".to_string(), "other".to_string()];
        assert_eq!(store.multi_delete(&keys).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_multi_delete_empty() {
        let store = MemoryStore::new();
        store.set("k", &json!("v")).await.unwrap();

        assert_eq!(store.multi_delete(&[]).await.unwrap(), 0);
        assert_eq!(store.len().await, 1);
    }
}
