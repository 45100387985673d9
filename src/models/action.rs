//! Result envelope for server actions.
//!
//! Server actions are mutations invoked from the admin UI. They always answer
//! HTTP 200 with `{ "success": bool, "error"?: string, "data"?: ... }` so the
//! caller can render inline feedback instead of handling a rejected request.

use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ActionResult<T: Serialize> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failure result carrying the client-safe message of `err`.
    pub fn failed(err: &AppError) -> Self {
        if err.status().is_server_error() {
            tracing::error!(error = %err, "Server action failed");
        } else {
            tracing::debug!(error = %err, "Server action rejected");
        }
        Self {
            success: false,
            data: None,
            error: Some(err.public_message()),
        }
    }
}

impl<T: Serialize> From<Result<T, AppError>> for ActionResult<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failed(&err),
        }
    }
}

impl ActionResult<()> {
    /// Success with no payload: `{ "success": true }`.
    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }
}
