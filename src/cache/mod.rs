//! TTL cache for derived, recomputable views.
//!
//! Values are stored as JSON so the same contract works for the in-process
//! map and for an external key-value store. Entries are replaced wholesale,
//! never mutated in place, so concurrent requests can at worst recompute the
//! same value twice.
//!
//! Nothing here is authoritative: any entry may be evicted or the whole
//! cache cleared without affecting correctness.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::AppError;

pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

pub use memory::MemoryCache;

/// Cache backend error.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache value encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Cache(err.to_string())
    }
}

/// Storage behind the cache.
///
/// Implementations must be thread-safe (`Send + Sync`) as they are shared
/// by every in-flight request.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Return the value stored under `key` if it has not expired.
    ///
    /// An expired entry is evicted and reported as a miss.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<(), CacheError>;

    /// Drop a single entry. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Drop every entry.
    async fn clear(&self) -> Result<(), CacheError>;
}

#[async_trait]
impl<C: CacheStore + ?Sized> CacheStore for Arc<C> {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<(), CacheError> {
        (**self).set(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        (**self).clear().await
    }
}

/// Typed read. Undecodable entries count as misses.
pub async fn get_cached<T: DeserializeOwned>(
    cache: &dyn CacheStore,
    key: &str,
) -> Result<Option<T>, CacheError> {
    let Some(value) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
            cache.remove(key).await?;
            Ok(None)
        }
    }
}

/// Typed write.
pub async fn set_cache<T: Serialize>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    cache.set(key, serde_json::to_value(value)?, ttl).await
}

/// Return the cached value for `key`, or compute, store and return it.
///
/// Cache backend failures never fail the request: reads degrade to a
/// recompute and writes are skipped, both with a warning.
pub async fn cached<T, F, Fut>(
    cache: &dyn CacheStore,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    match get_cached::<T>(cache, key).await {
        Ok(Some(hit)) => {
            tracing::debug!(key, "Cache hit");
            return Ok(hit);
        }
        Ok(None) => tracing::debug!(key, "Cache miss"),
        Err(e) => tracing::warn!(key, error = %e, "Cache read failed, recomputing"),
    }

    let value = compute().await?;
    if let Err(e) = set_cache(cache, key, &value, ttl).await {
        tracing::warn!(key, error = %e, "Cache write failed");
    }
    Ok(value)
}
