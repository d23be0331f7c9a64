// SPDX-License-Identifier: MIT

//! Run-scoped key-value bus
//!
//! Nodes publish their outputs here and read their predecessors' outputs.
//! Each operation is atomic on its own; there is no multi-key transaction and
//! no consistent snapshot across separate calls.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared store passed between the node executions of one run.
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Debug, Clone, Default)]
pub struct KvStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given entries
    pub fn seeded<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Get a value; `None` means the key was not found
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: Value) {
        self.entries.write().await.insert(key.into(), value);
    }

    /// Remove a key, returning its previous value
    pub async fn delete(&self, key: &str) -> Option<Value> {
        self.entries.write().await.remove(key)
    }

    /// Read several keys under one lock acquisition. Missing keys are omitted.
    pub async fn get_many(&self, keys: &[String]) -> Map<String, Value> {
        let entries = self.entries.read().await;
        keys.iter()
            .filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Convert the current contents to a JSON object
    pub async fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .read()
                .await
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_store() {
        let store = KvStore::new();
        assert!(store.get("anything").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = KvStore::new();
        store.set("answer", json!(42)).await;
        assert_eq!(store.get("answer").await, Some(json!(42)));

        store.set("answer", json!({"nested": [true, null]})).await;
        assert_eq!(
            store.get("answer").await,
            Some(json!({"nested": [true, null]}))
        );
    }

    #[tokio::test]
    async fn test_delete_then_get() {
        let store = KvStore::new();
        store.set("k", json!("v")).await;
        assert_eq!(store.delete("k").await, Some(json!("v")));
        assert!(store.get("k").await.is_none());
        assert!(store.delete("k").await.is_none());
    }

    #[tokio::test]
    async fn test_seeded_and_get_many() {
        let store = KvStore::seeded([("a", json!(1)), ("b", json!("two"))]);
        let keys = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let got = store.get_many(&keys).await;

        assert_eq!(got.len(), 2);
        assert_eq!(got["a"], json!(1));
        assert_eq!(got["b"], json!("two"));
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = KvStore::new();
        let clone = store.clone();
        clone.set("shared", json!(true)).await;
        assert_eq!(store.get("shared").await, Some(json!(true)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let store = KvStore::new();
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.set(format!("key-{}", i), json!(i)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 32);
        let json = store.to_json().await;
        assert_eq!(json["key-7"], 7);
    }
}
