//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, session claims)
//! 2. Delegates to a service
//! 3. Returns an HTTP response (JSON, status code)

/// Server actions (toggle, delete)
pub mod actions;
/// Analytics rollups
pub mod analytics;
/// Current user
pub mod auth;
/// Stores and products
pub mod catalog;
pub mod health;
/// Invoice generation and listing
pub mod invoices;
/// Card issuance, pending list, lookup
pub mod qr;
/// Public scan view
pub mod scan;
