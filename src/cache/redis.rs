//! Redis cache backend for multi-instance deployments.
//!
//! Expiry is delegated to Redis (`SET ... EX`), so an expired key is simply
//! absent. All keys live under a prefix so `clear` only touches this
//! service's entries.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};

use super::{CacheError, CacheStore};

const KEY_PREFIX: &str = "qr-card-admin:";
const SCAN_BATCH: usize = 500;

pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(backend)?;
        let connection = client.get_connection_manager().await.map_err(backend)?;
        Ok(Self { connection })
    }
}

fn backend(err: redis::RedisError) -> CacheError {
    CacheError::Backend(err.to_string())
}

fn prefixed(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// One `SCAN` page over this service's keys, starting at `cursor`.
fn scan_page(cursor: u64) -> redis::Cmd {
    let mut cmd = redis::cmd("SCAN");
    cmd.arg(cursor)
        .arg("MATCH")
        .arg(format!("{KEY_PREFIX}*"))
        .arg("COUNT")
        .arg(SCAN_BATCH);
    cmd
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(prefixed(key)).await.map_err(backend)?;
        raw.map(|s| serde_json::from_str(&s).map_err(CacheError::from))
            .transpose()
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        // Redis rejects EX 0
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(prefixed(key), value.to_string(), seconds)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(prefixed(key)).await.map_err(backend)?;
        Ok(())
    }

    /// Walks the prefix with `SCAN` until the cursor wraps to 0.
    async fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = scan_page(cursor)
                .query_async(&mut conn)
                .await
                .map_err(backend)?;
            if !keys.is_empty() {
                let _: () = conn.del(keys).await.map_err(backend)?;
            }
            if next == 0 {
                return Ok(());
            }
            cursor = next;
        }
    }
}
