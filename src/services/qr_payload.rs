//! Scannable payloads for issued cards.

use crate::config::{DEFAULT_BASE_URL, resolve_base_url};

/// Builds `{base_url}/scan/{code}` URLs.
///
/// Pure and deterministic for a given base URL; the only side effect is a
/// debug log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrEncoder {
    base_url: String,
}

impl QrEncoder {
    /// Trailing slashes are trimmed; a blank value falls back to the default.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: resolve_base_url([Some(base_url.as_ref())]),
        }
    }

    /// Like [`QrEncoder::new`], but rejects anything that is not an absolute
    /// http(s) URL. Used at startup so misconfiguration fails fast.
    pub fn parse(base_url: impl AsRef<str>) -> Result<Self, String> {
        let encoder = Self::new(base_url);
        let parsed = url::Url::parse(&encoder.base_url)
            .map_err(|e| format!("invalid base URL {:?}: {e}", encoder.base_url))?;
        match parsed.scheme() {
            "http" | "https" => Ok(encoder),
            other => Err(format!("base URL must use http or https, got {other:?}")),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn encode(&self, code: &str) -> String {
        let payload = format!("{}/scan/{}", self.base_url, code);
        tracing::debug!(%payload, "Encoded QR payload");
        payload
    }
}

impl Default for QrEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
