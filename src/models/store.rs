//! Company and store models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a company record. Companies own stores.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Represents a store record from the database.
///
/// # Database Table
///
/// Maps to the `stores` table. Each store:
/// - Belongs to exactly one company (`company_id` is NOT NULL)
/// - Carries a generated short `code` that is unique across stores
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub address: String,

    /// Short code printed on store paperwork, generated at creation
    pub code: String,

    /// Contact phone number
    pub phone: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Request body for creating a store.
///
/// # JSON Example
///
/// ```json
/// {
///   "companyId": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Downtown Kiosk",
///   "address": "12 Market St",
///   "phone": "+1 555 0100"
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    pub company_id: Uuid,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Validated store insert, including the generated code.
#[derive(Debug, Clone)]
pub struct NewStore {
    pub company_id: Uuid,
    pub name: String,
    pub address: String,
    pub code: String,
    pub phone: Option<String>,
}
