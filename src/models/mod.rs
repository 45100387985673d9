//! Data models representing database entities and API payloads.
//!
//! Database-facing structs derive `sqlx::FromRow`; everything sent over the
//! wire serializes in camelCase.

/// Server action result envelope
pub mod action;
/// Analytics filters and rollup outputs
pub mod analytics;
/// Cards, keys and lifecycle payloads
pub mod card;
/// Invoices that redeem activated cards
pub mod invoice;
/// Products and their denominations
pub mod product;
/// Companies and stores
pub mod store;
/// Users, roles and session claims
pub mod user;
