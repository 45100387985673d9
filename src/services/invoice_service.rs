//! Invoice service - reconciles activated cards into invoices.
//!
//! Generating an invoice is the only way a card becomes redeemed. Every
//! pending card of the store is linked to the invoice and marked redeemed
//! in a single database transaction.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    cache::CacheStore,
    error::{AppError, ValidationIssue},
    models::{
        analytics::AnalyticsFilter,
        invoice::{Invoice, InvoiceWithCards},
    },
    repository::Repository,
    services::{card_service, identifier},
};

/// Create an invoice for all pending cards of `store_id`.
///
/// # Errors
///
/// - `NotFound`: store does not exist
/// - `Validation`: the store has no activated, uninvoiced cards
/// - `Conflict`: generated invoice number collided (not retried)
pub async fn generate_invoice(
    repo: &dyn Repository,
    cache: &dyn CacheStore,
    store_id: Uuid,
) -> Result<InvoiceWithCards, AppError> {
    repo.get_store(store_id)
        .await?
        .ok_or(AppError::NotFound("Store"))?;

    let number = identifier::generate_invoice_number(Utc::now().date_naive());

    let invoice = repo
        .redeem_pending(store_id, number)
        .await?
        .ok_or_else(|| {
            AppError::Validation(vec![ValidationIssue::new(
                "storeId",
                "Store has no activated cards awaiting an invoice",
            )])
        })?;

    for card in &invoice.cards {
        card_service::evict_lookup(cache, &card.card.code).await;
    }

    tracing::info!(
        invoice_id = %invoice.invoice.id,
        number = %invoice.invoice.number,
        store_id = %store_id,
        card_count = invoice.invoice.card_count,
        total_cents = invoice.invoice.total_cents,
        "Generated invoice"
    );

    Ok(invoice)
}

/// Invoices newest first, optionally for one store.
pub async fn list_invoices(
    repo: &dyn Repository,
    store_id: Option<Uuid>,
) -> Result<Vec<Invoice>, AppError> {
    let filter = AnalyticsFilter {
        store_id,
        ..AnalyticsFilter::default()
    };
    repo.list_invoices(&filter).await
}

pub async fn get_invoice(repo: &dyn Repository, id: Uuid) -> Result<InvoiceWithCards, AppError> {
    repo.get_invoice(id)
        .await?
        .ok_or(AppError::NotFound("Invoice"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryCache,
        models::card::IssueCardsRequest,
        repository::memory::MemoryRepository,
        services::qr_payload::QrEncoder,
    };
    use std::time::Duration;

    #[tokio::test]
    async fn invoice_redeems_pending_cards_and_freezes_them() {
        let repo = MemoryRepository::new();
        let cache = MemoryCache::new();
        let encoder = QrEncoder::default();
        let store = repo.seed_store("Harbor Mall");
        let product = repo.seed_product("Coffee Card", true, &[("$10", 1_000)]);

        let issued = card_service::issue_cards(
            &repo,
            &encoder,
            IssueCardsRequest {
                product_id: product.product.id,
                denomination_id: Some(product.denominations[0].id),
                store_id: store.id,
                quantity: 3,
                with_key: false,
            },
        )
        .await
        .unwrap();

        for card in &issued[..2] {
            card_service::toggle_activation(&repo, &cache, card.id, None)
                .await
                .unwrap();
        }
        // Warm the lookup cache so eviction is observable
        card_service::lookup_card(&repo, &cache, &encoder, Duration::from_secs(60), &issued[0].code)
            .await
            .unwrap();

        let invoice = generate_invoice(&repo, &cache, store.id).await.unwrap();
        assert_eq!(invoice.invoice.card_count, 2);
        assert_eq!(invoice.invoice.total_cents, 2_000);
        assert!(invoice.invoice.number.starts_with("INV-"));
        assert!(invoice.cards.iter().all(|c| c.card.is_redeemed));

        let looked_up = card_service::lookup_card(
            &repo,
            &cache,
            &encoder,
            Duration::from_secs(60),
            &issued[0].code,
        )
        .await
        .unwrap()
        .unwrap();
        assert!(looked_up.card.card.is_redeemed);

        let err = card_service::toggle_activation(&repo, &cache, issued[0].id, Some(true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert!(card_service::list_pending(&repo, Some(store.id)).await.unwrap().is_empty());

        let listed = list_invoices(&repo, Some(store.id)).await.unwrap();
        assert_eq!(listed.len(), 1);
        let fetched = get_invoice(&repo, listed[0].id).await.unwrap();
        assert_eq!(fetched.cards.len(), 2);
    }

    #[tokio::test]
    async fn nothing_pending_is_a_validation_error() {
        let repo = MemoryRepository::new();
        let cache = MemoryCache::new();
        let store = repo.seed_store("Empty Store");

        let err = generate_invoice(&repo, &cache, store.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = generate_invoice(&repo, &cache, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Store")));
    }

    #[tokio::test]
    async fn unknown_invoice_is_not_found() {
        let repo = MemoryRepository::new();
        let err = get_invoice(&repo, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Invoice")));
    }
}
