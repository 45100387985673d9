//! Product catalog models.
//!
//! A product is a catalog entry (e.g. "Coffee Gift Card"); its
//! denominations are the value tiers cards can be issued at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a product record from the database.
///
/// Only active products can be used for new card issuance and appear in
/// default listings.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A value tier of a product.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Denomination {
    pub id: Uuid,
    pub product_id: Uuid,

    /// Display label, e.g. "$25"
    pub label: String,

    /// Face value in cents
    pub value_cents: i64,
}

/// Product together with its denominations, as returned by the catalog API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithDenominations {
    #[serde(flatten)]
    pub product: Product,
    pub denominations: Vec<Denomination>,
}

impl ProductWithDenominations {
    pub fn denomination(&self, id: Uuid) -> Option<&Denomination> {
        self.denominations.iter().find(|d| d.id == id)
    }
}

/// Request body for creating a product.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Coffee Gift Card",
///   "description": "Redeemable at any partner cafe",
///   "denominations": [
///     { "label": "$10", "valueCents": 1000 },
///     { "label": "$25", "valueCents": 2500 }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Defaults to true
    #[serde(default = "default_active")]
    pub is_active: bool,

    #[serde(default)]
    pub denominations: Vec<NewDenomination>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDenomination {
    pub label: String,
    pub value_cents: i64,
}
