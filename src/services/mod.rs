//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They validate input, coordinate repository calls and the cache, and
//! return `Result<T, AppError>` for handlers to map onto HTTP.

pub mod analytics_service;
pub mod card_service;
pub mod catalog_service;
pub mod identifier;
pub mod invoice_service;
pub mod qr_payload;
