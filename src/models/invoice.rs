//! Invoice models.
//!
//! Generating an invoice for a store redeems every activated card of that
//! store that has not been invoiced yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::card::CardDetail;

/// Represents an invoice record from the database.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,

    /// Human-facing number, `INV-YYYYMMDD-XXXXXX`
    pub number: String,

    pub store_id: Uuid,
    pub card_count: i32,

    /// Sum of the face values of the redeemed cards
    pub total_cents: i64,

    pub created_at: DateTime<Utc>,
}

/// Invoice with the cards it redeemed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceWithCards {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub cards: Vec<CardDetail>,
}

/// Request body for generating an invoice.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInvoiceRequest {
    pub store_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceQuery {
    #[serde(default)]
    pub store_id: Option<Uuid>,
}
