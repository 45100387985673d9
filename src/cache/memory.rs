//! In-process cache backend for single-instance deployments.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CacheError, CacheStore};

/// Cache entry with expiration.
#[derive(Debug)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Process-wide key → value map with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every expired entry.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.entries.write().retain(|_, entry| now < entry.expires_at);
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        drop(entries);

        // Expired: evict unless another request already replaced it.
        let mut entries = self.entries.write();
        if entries
            .get(key)
            .is_some_and(|entry| Instant::now() >= entry.expires_at)
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let cache = MemoryCache::new();
        cache
            .set("financial:*", json!({ "total": 5 }), Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(
            cache.get("financial:*").await.unwrap(),
            Some(json!({ "total": 5 }))
        );
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_evicted() {
        let cache = MemoryCache::new();
        cache
            .set("k", json!(1), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn set_replaces_previous_entry() {
        let cache = MemoryCache::new();
        cache.set("k", json!("old"), Duration::from_secs(60)).await.unwrap();
        cache.set("k", json!("new"), Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(json!("new")));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let cache = MemoryCache::new();
        cache.set("a", json!(1), Duration::from_secs(60)).await.unwrap();
        cache.set("b", json!(2), Duration::from_secs(60)).await.unwrap();

        cache.remove("a").await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(cache.get("b").await.unwrap(), Some(json!(2)));

        cache.clear().await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn cleanup_drops_only_expired_entries() {
        let cache = MemoryCache::new();
        cache.set("short", json!(1), Duration::from_millis(5)).await.unwrap();
        cache.set("long", json!(2), Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.cleanup_expired();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long").await.unwrap(), Some(json!(2)));
    }
}
