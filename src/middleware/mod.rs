//! HTTP middleware components.
//!
//! Middleware run before route handlers. Here they resolve sessions into
//! claims and short-circuit requests the caller is not allowed to make.

/// Session resolution and role gates
pub mod auth;
