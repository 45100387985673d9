//! Card (QR code) models and lifecycle request/response types.
//!
//! This module defines:
//! - `Card`: Database entity representing an issued QR card
//! - `CardKey`: Optional authorization code linked 1:1 to a card
//! - `CardDetail`: Card joined with its product, denomination and store
//! - Request and response bodies for issuance, lookup and pending listings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a card record from the database.
///
/// # Database Table
///
/// Maps to the `cards` table. Each card:
/// - Has a globally unique 8-character `code` (UNIQUE constraint)
/// - Belongs to one product and one store
/// - Is activated by an administrator and redeemed by an invoice
///
/// # Redemption
///
/// `is_redeemed` never returns to false once set. Deleting the card is the
/// only way to undo a redemption.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,

    /// Human-typable identifier encoded in the QR payload
    pub code: String,

    pub product_id: Uuid,
    pub denomination_id: Option<Uuid>,
    pub store_id: Uuid,

    pub is_activated: bool,
    pub is_redeemed: bool,

    /// Invoice that redeemed this card, if any
    pub invoice_id: Option<Uuid>,

    pub activated_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Activated but not yet reconciled into an invoice.
    pub fn is_pending(&self) -> bool {
        self.is_activated && self.invoice_id.is_none()
    }
}

/// Authorization key linked to a card, used during verification lookups.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardKey {
    pub id: Uuid,
    pub card_id: Uuid,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

/// Card joined with the names and value needed for listings and analytics.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub card: Card,

    pub product_name: String,
    pub store_name: String,
    pub denomination_label: Option<String>,

    /// Face value of the card's denomination; 0 when none was chosen
    pub value_cents: i64,
}

/// Validated card insert produced by the issuance service.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub code: String,
    pub key_code: Option<String>,
    pub product_id: Uuid,
    pub denomination_id: Option<Uuid>,
    pub store_id: Uuid,
}

/// Card together with its key, as returned from the repository after insert.
#[derive(Debug, Clone)]
pub struct IssuedRecord {
    pub card: Card,
    pub key: Option<CardKey>,
}

/// Request to issue one or more cards.
///
/// # JSON Example
///
/// ```json
/// {
///   "productId": "550e8400-e29b-41d4-a716-446655440000",
///   "denominationId": "660e8400-e29b-41d4-a716-446655440001",
///   "storeId": "770e8400-e29b-41d4-a716-446655440002",
///   "quantity": 20,
///   "withKey": true
/// }
/// ```
///
/// # Validation
///
/// - `quantity`: 1 to 500, defaults to 1
/// - Product must exist and be active
/// - Denomination, when given, must belong to the product
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCardsRequest {
    pub product_id: Uuid,

    #[serde(default)]
    pub denomination_id: Option<Uuid>,

    pub store_id: Uuid,

    #[serde(default = "default_quantity")]
    pub quantity: u32,

    /// Also generate a linked authorization key per card
    #[serde(default)]
    pub with_key: bool,
}

fn default_quantity() -> u32 {
    1
}

/// One freshly issued card with its scannable payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCard {
    pub id: Uuid,
    pub code: String,
    pub key_code: Option<String>,
    pub qr_payload: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful lookup by identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardLookup {
    pub card: CardDetail,
    pub key: Option<CardKey>,
    pub qr_payload: String,
}

/// Lookup response. `found` is false (with HTTP 200) when no card matches.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    pub found: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<CardDetail>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<CardKey>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
}

impl From<Option<CardLookup>> for LookupResponse {
    fn from(lookup: Option<CardLookup>) -> Self {
        match lookup {
            Some(found) => Self {
                found: true,
                card: Some(found.card),
                key: found.key,
                qr_payload: Some(found.qr_payload),
            },
            None => Self {
                found: false,
                card: None,
                key: None,
                qr_payload: None,
            },
        }
    }
}

/// Public view returned by the scan endpoint a QR code points at.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub code: String,
    pub product_name: String,
    pub denomination_label: Option<String>,
    pub value_cents: i64,
    pub is_activated: bool,
    pub is_redeemed: bool,

    /// Activated and not yet redeemed
    pub valid: bool,
}

impl From<CardLookup> for ScanResponse {
    fn from(lookup: CardLookup) -> Self {
        let card = lookup.card;
        Self {
            valid: card.card.is_activated && !card.card.is_redeemed,
            code: card.card.code,
            product_name: card.product_name,
            denomination_label: card.denomination_label,
            value_cents: card.value_cents,
            is_activated: card.card.is_activated,
            is_redeemed: card.card.is_redeemed,
        }
    }
}

/// Activated, un-invoiced cards of one store.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingGroup {
    pub store_id: Uuid,
    pub store_name: String,
    pub card_count: usize,
    pub total_value_cents: i64,
    pub cards: Vec<CardDetail>,
}

/// Body of the `toggleQRStatus` server action.
///
/// `id` stays a string so malformed ids become a failure result instead of
/// an extractor rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleQrStatusRequest {
    pub id: String,

    /// Activation state the caller last saw; a mismatch is a stale write
    #[serde(default)]
    pub current_status: Option<bool>,
}

/// Body of the `deleteQR` server action.
#[derive(Debug, Deserialize)]
pub struct DeleteQrRequest {
    pub id: String,
}

/// Data returned by a successful toggle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub id: Uuid,
    pub is_activated: bool,
}

/// Query string of the pending-activation listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    #[serde(default)]
    pub store_id: Option<Uuid>,
}
