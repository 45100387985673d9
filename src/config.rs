//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use std::time::Duration;

/// Base URL used for QR payloads when neither `PUBLIC_BASE_URL` nor `BASE_URL` is set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `PUBLIC_BASE_URL` / `BASE_URL` (optional): origin used in QR payloads
/// - `ANALYTICS_CACHE_TTL_SECS` (optional): analytics cache lifetime, defaults to 300
/// - `LOOKUP_CACHE_TTL_SECS` (optional): card lookup cache lifetime, defaults to 60
/// - `REDIS_URL` (optional): shared cache backend, only read with the `redis-cache` feature
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default)]
    pub public_base_url: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_analytics_ttl")]
    pub analytics_cache_ttl_secs: u64,

    #[serde(default = "default_lookup_ttl")]
    pub lookup_cache_ttl_secs: u64,

    #[serde(default)]
    pub redis_url: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_analytics_ttl() -> u64 {
    300
}

fn default_lookup_ttl() -> u64 {
    60
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Resolve the origin for QR payloads.
    ///
    /// Sources are tried in order: `PUBLIC_BASE_URL`, `BASE_URL`, then
    /// [`DEFAULT_BASE_URL`]. Blank values count as unset.
    pub fn resolved_base_url(&self) -> String {
        resolve_base_url([self.public_base_url.as_deref(), self.base_url.as_deref()])
    }

    pub fn analytics_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.analytics_cache_ttl_secs)
    }

    pub fn lookup_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.lookup_cache_ttl_secs)
    }
}

/// Pick the first non-blank candidate, falling back to [`DEFAULT_BASE_URL`].
pub fn resolve_base_url<'a, I>(candidates: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/')
        .to_string()
}
