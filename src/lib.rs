//! QR card administration service.
//!
//! Issues gift/loyalty cards identified by short codes encoded in QR
//! payloads, tracks their activation and redemption, reconciles activated
//! cards into per-store invoices, and serves cached analytics rollups.

pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod services;
