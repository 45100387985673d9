//! Data access abstraction.
//!
//! Services talk to persistence only through [`Repository`]. Production uses
//! [`PgRepository`]; tests run against the in-memory implementation.
//!
//! Multi-statement writes (card issuance, invoice generation) are atomic
//! inside each implementation. Everything else is a single statement.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        analytics::{AnalyticsFilter, LifecycleCounts, ProductStateCounts},
        card::{Card, CardDetail, CardKey, IssuedRecord, NewCard},
        invoice::{Invoice, InvoiceWithCards},
        product::{CreateProductRequest, ProductWithDenominations},
        store::{NewStore, Store},
        user::{SessionRow, User},
    },
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgRepository;

#[async_trait]
pub trait Repository: Send + Sync {
    /// Connectivity check used by the health endpoint.
    async fn ping(&self) -> Result<(), AppError>;

    // ── Catalog ─────────────────────────────────────────────────

    async fn list_stores(&self) -> Result<Vec<Store>, AppError>;

    async fn get_store(&self, id: Uuid) -> Result<Option<Store>, AppError>;

    /// Fails with `NotFound("Company")` for an unknown company and
    /// `Conflict` when the generated code is taken.
    async fn create_store(&self, store: NewStore) -> Result<Store, AppError>;

    /// Products ordered by name, each with its denominations.
    async fn list_products(&self, include_inactive: bool) -> Result<Vec<ProductWithDenominations>, AppError>;

    async fn get_product(&self, id: Uuid) -> Result<Option<ProductWithDenominations>, AppError>;

    async fn create_product(&self, product: CreateProductRequest) -> Result<ProductWithDenominations, AppError>;

    // ── Cards ───────────────────────────────────────────────────

    /// Insert every card (and key) or none. A duplicate code fails the whole
    /// batch with `Conflict`.
    async fn insert_cards(&self, cards: Vec<NewCard>) -> Result<Vec<IssuedRecord>, AppError>;

    async fn get_card(&self, id: Uuid) -> Result<Option<Card>, AppError>;

    async fn find_card_by_code(&self, code: &str) -> Result<Option<(CardDetail, Option<CardKey>)>, AppError>;

    /// Set `is_activated` to `to` if it currently equals `from` and the card
    /// is not redeemed. Returns `None` when no row matched.
    async fn set_activation(&self, id: Uuid, from: bool, to: bool) -> Result<Option<Card>, AppError>;

    /// Hard delete. Returns the removed card, `None` if it did not exist.
    async fn delete_card(&self, id: Uuid) -> Result<Option<Card>, AppError>;

    /// Activated cards without an invoice, oldest activation first.
    async fn list_pending_cards(&self, store_id: Option<Uuid>) -> Result<Vec<CardDetail>, AppError>;

    /// Cards matching the store/product filter, created inside the date window.
    async fn list_cards(&self, filter: &AnalyticsFilter) -> Result<Vec<CardDetail>, AppError>;

    /// Card counts per product and state over the same set as [`Repository::list_cards`],
    /// ordered by product name.
    async fn count_cards_by_product(
        &self,
        filter: &AnalyticsFilter,
    ) -> Result<Vec<ProductStateCounts>, AppError>;

    /// Stage totals and mean stage durations over the same set as [`Repository::list_cards`].
    async fn lifecycle_counts(&self, filter: &AnalyticsFilter) -> Result<LifecycleCounts, AppError>;

    // ── Invoices ────────────────────────────────────────────────

    /// Redeem all pending cards of a store into a new invoice numbered
    /// `number`. Returns `None` when the store has nothing pending.
    async fn redeem_pending(&self, store_id: Uuid, number: String) -> Result<Option<InvoiceWithCards>, AppError>;

    /// Invoices matching the store filter, created inside the date window,
    /// newest first.
    async fn list_invoices(&self, filter: &AnalyticsFilter) -> Result<Vec<Invoice>, AppError>;

    async fn get_invoice(&self, id: Uuid) -> Result<Option<InvoiceWithCards>, AppError>;

    // ── Users & sessions ────────────────────────────────────────

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRow>, AppError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
}
