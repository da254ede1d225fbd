//! Durable key-value store capability for the memory tiers
//!
//! Modeled on the small slice of Redis the memory tiers need: string values
//! and lists, both with per-key TTL. Implementations must make each
//! operation atomic per key; the in-memory store gets this from DashMap's
//! per-entry locking, the SQLite store from transactions.

use crate::backend::BackendError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

/// Key-value and list operations with TTL
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Get a string value; expired keys read as absent
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Set a string value, refreshing the TTL
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError>;

    /// Delete a key of any type
    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Append items to a list, refreshing the TTL; returns the new length
    async fn list_append(
        &self,
        key: &str,
        items: &[String],
        ttl: Duration,
    ) -> Result<usize, BackendError>;

    /// All items of a list, oldest first; expired or missing keys are empty
    async fn list_range(&self, key: &str) -> Result<Vec<String>, BackendError>;

    /// Drop the oldest items so at most `keep` remain
    async fn list_trim_last(&self, key: &str, keep: usize) -> Result<(), BackendError>;
}

enum StoredValue {
    Text(String),
    List(Vec<String>),
}

struct Entry {
    value: StoredValue,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

fn expiry(ttl: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Process-local store backed by DashMap, for tests and ephemeral runs
#[derive(Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let now = Utc::now();
        match self.entries.get(key) {
            Some(entry) if entry.expired(now) => {
                drop(entry);
                self.entries.remove(key);
                Ok(None)
            }
            Some(entry) => match &entry.value {
                StoredValue::Text(s) => Ok(Some(s.clone())),
                StoredValue::List(_) => Err(BackendError::InvalidInput(format!(
                    "key {} holds a list, not a value",
                    key
                ))),
            },
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: StoredValue::Text(value.to_string()),
                expires_at: expiry(ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list_append(
        &self,
        key: &str,
        items: &[String],
        ttl: Duration,
    ) -> Result<usize, BackendError> {
        let now = Utc::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::List(Vec::new()),
            expires_at: expiry(ttl),
        });

        if entry.expired(now) {
            entry.value = StoredValue::List(Vec::new());
        }
        entry.expires_at = expiry(ttl);

        match &mut entry.value {
            StoredValue::List(list) => {
                list.extend(items.iter().cloned());
                Ok(list.len())
            }
            StoredValue::Text(_) => Err(BackendError::InvalidInput(format!(
                "key {} holds a value, not a list",
                key
            ))),
        }
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, BackendError> {
        let now = Utc::now();
        match self.entries.get(key) {
            Some(entry) if entry.expired(now) => {
                drop(entry);
                self.entries.remove(key);
                Ok(Vec::new())
            }
            Some(entry) => match &entry.value {
                StoredValue::List(list) => Ok(list.clone()),
                StoredValue::Text(_) => Err(BackendError::InvalidInput(format!(
                    "key {} holds a value, not a list",
                    key
                ))),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn list_trim_last(&self, key: &str, keep: usize) -> Result<(), BackendError> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if let StoredValue::List(list) = &mut entry.value {
                if list.len() > keep {
                    let excess = list.len() - keep;
                    list.drain(..excess);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ttl() -> Duration {
        Duration::from_secs(60)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = InMemoryStore::new();
        store.put("k", "v", ttl()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_reads_as_absent() {
        let store = InMemoryStore::new();
        store.put("k", "v", Duration::from_secs(0)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_append_and_trim() {
        let store = InMemoryStore::new();
        let items: Vec<String> = (0..6).map(|i| format!("m{}", i)).collect();
        let len = store.list_append("l", &items, ttl()).await.unwrap();
        assert_eq!(len, 6);

        store.list_trim_last("l", 4).await.unwrap();
        let range = store.list_range("l").await.unwrap();
        assert_eq!(range, vec!["m2", "m3", "m4", "m5"]);
    }

    #[tokio::test]
    async fn test_type_mismatch_rejected() {
        let store = InMemoryStore::new();
        store.put("k", "v", ttl()).await.unwrap();
        let err = store
            .list_append("k", &["x".to_string()], ttl())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        store.put("k", "v", ttl()).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
