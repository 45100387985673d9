//! QR Card Admin - Main Application Entry Point
//!
//! REST API backing the card administration console: issuing QR cards,
//! toggling their activation, invoicing activated cards per store, and
//! serving analytics to administrators.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: session tokens with SHA-256 hashing
//! - **Cache**: in-process TTL map, or Redis with the `redis-cache` feature
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Select the cache backend
//! 5. Build HTTP router and start server on configured port

use std::{sync::Arc, time::Duration};

use qr_card_admin::{
    app::{self, AppState},
    cache::{CacheStore, MemoryCache},
    config::Config,
    db,
    repository::PgRepository,
    services::qr_payload::QrEncoder,
};
use tracing_subscriber::EnvFilter;

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let qr = QrEncoder::parse(config.resolved_base_url()).map_err(anyhow::Error::msg)?;
    tracing::info!(base_url = qr.base_url(), "QR payload origin resolved");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let state = AppState {
        repo: Arc::new(PgRepository::new(pool)),
        cache: select_cache(&config).await?,
        qr,
        analytics_ttl: config.analytics_cache_ttl(),
        lookup_ttl: config.lookup_cache_ttl(),
    };

    let app = app::build_router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "redis-cache")]
async fn select_cache(config: &Config) -> anyhow::Result<Arc<dyn CacheStore>> {
    use qr_card_admin::cache::redis::RedisCache;

    if let Some(url) = config.redis_url.as_deref() {
        let cache = RedisCache::connect(url).await?;
        tracing::info!("Using Redis cache");
        return Ok(Arc::new(cache));
    }
    tracing::info!("REDIS_URL not set, using in-process cache");
    Ok(memory_cache())
}

#[cfg(not(feature = "redis-cache"))]
async fn select_cache(config: &Config) -> anyhow::Result<Arc<dyn CacheStore>> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but the redis-cache feature is disabled; using in-process cache");
    }
    Ok(memory_cache())
}

/// In-process cache plus a background sweep of expired entries.
///
/// Reads already ignore expired entries; the sweep only bounds memory held
/// by keys that are never read again.
fn memory_cache() -> Arc<dyn CacheStore> {
    let cache = Arc::new(MemoryCache::new());
    let sweeper = Arc::clone(&cache);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.cleanup_expired();
            tracing::trace!(entries = sweeper.len(), "Swept expired cache entries");
        }
    });
    cache
}
