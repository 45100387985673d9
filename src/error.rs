//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

/// A single problem found while validating request input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Name of the offending field as the client sent it (e.g. `dateFrom`)
    pub path: String,

    /// Human-readable description of the problem
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Application-wide error type.
///
/// Every service function returns `Result<T, AppError>`; only this module
/// decides which HTTP status a failure becomes.
///
/// # Error Categories
///
/// - **Validation Errors**: Malformed query parameters or request bodies
/// - **Resource Errors**: Requested records not found
/// - **Conflict Errors**: Constraint violations and stale writes
/// - **Authentication Errors**: Missing session or insufficient role
/// - **Internal Errors**: Database, cache or other unexpected failures
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache backend failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Unexpected runtime failure (corrupt row, serialization, ...).
    #[error("Internal error: {0}")]
    Internal(String),

    /// No valid session accompanied the request.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Authentication required")]
    Unauthenticated,

    /// Session is valid but its role may not perform the request.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Insufficient permissions")]
    Forbidden,

    /// Requested record does not exist. The payload names the entity.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Write collided with existing state (unique violation, stale toggle, redeemed card).
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// One or more query parameters failed validation.
    ///
    /// Returns HTTP 400 Bad Request with the issue list.
    #[error("Invalid query parameters")]
    Validation(Vec<ValidationIssue>),
}

impl AppError {
    /// Translate constraint violations into client-facing errors.
    ///
    /// Unique violations become `Conflict`, foreign key violations become
    /// `NotFound(referenced)`. Anything else stays a database error.
    pub fn from_write(err: sqlx::Error, conflict: &str, referenced: &'static str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::Conflict(conflict.to_string());
            }
            if db_err.is_foreign_key_violation() {
                return AppError::NotFound(referenced);
            }
        }
        AppError::Database(err)
    }

    /// Short machine-readable code included in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => "internal_error",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Validation(_) => "validation_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message that is safe to show to a client.
    ///
    /// Internal failures collapse to a generic sentence; their detail only
    /// reaches the server log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Malformed query strings (duplicate or mistyped fields) are input problems.
impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(vec![ValidationIssue::new("query", rejection.body_text())])
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "validation_error",
///     "message": "Invalid query parameters",
///     "issues": [{ "path": "dateFrom", "message": "..." }]
///   }
/// }
/// ```
///
/// `issues` is only present for validation errors.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let mut error = json!({
            "code": self.code(),
            "message": self.public_message(),
        });
        if let AppError::Validation(issues) = &self {
            error["issues"] = json!(issues);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_detail() {
        let err = AppError::Internal("row decode failed: role=ROOT".to_string());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "An internal error occurred");
        assert_eq!(err.code(), "internal_error");
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = AppError::NotFound("Card");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "Card not found");
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let err = AppError::Validation(vec![ValidationIssue::new("dateFrom", "bad")]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "validation_error");
    }
}
