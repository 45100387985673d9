//! Card service - issuance and lifecycle of QR cards.
//!
//! This service handles:
//! - Issuing single cards or batches with generated codes
//! - Lookup by identifier (cached, evicted on writes)
//! - Activation toggling with stale-write detection
//! - Hard deletion
//! - Listing activated cards that still await an invoice
//!
//! # Redemption
//!
//! Redemption happens only through invoice generation and is permanent.
//! Redeemed cards keep their activation state frozen.

use std::{collections::HashMap, time::Duration};

use uuid::Uuid;

use crate::{
    cache::{self, CacheStore},
    error::AppError,
    models::card::{
        CardDetail, CardLookup, IssueCardsRequest, IssuedCard, NewCard, PendingGroup,
        ToggleOutcome,
    },
    repository::Repository,
    services::{identifier, qr_payload::QrEncoder},
};

/// Upper bound on cards issued by one request.
pub const MAX_BATCH: u32 = 500;

/// Cache key of the lookup view for `code`.
pub fn lookup_cache_key(code: &str) -> String {
    format!("qr:{code}")
}

/// Issue one or more cards.
///
/// # Process
///
/// 1. Validate quantity, product (must be active), denomination and store
/// 2. Generate a code (and optional key code) per card
/// 3. Insert the batch atomically
/// 4. Return each card with its QR payload
///
/// # Errors
///
/// - `InvalidRequest`: quantity out of range, inactive product, foreign denomination
/// - `NotFound`: product or store does not exist
/// - `Conflict`: a generated code collided with an existing one (not retried)
pub async fn issue_cards(
    repo: &dyn Repository,
    encoder: &QrEncoder,
    request: IssueCardsRequest,
) -> Result<Vec<IssuedCard>, AppError> {
    if request.quantity == 0 || request.quantity > MAX_BATCH {
        return Err(AppError::InvalidRequest(format!(
            "Quantity must be between 1 and {MAX_BATCH}"
        )));
    }

    let product = repo
        .get_product(request.product_id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    if !product.product.is_active {
        return Err(AppError::InvalidRequest(
            "Cards can only be issued for active products".to_string(),
        ));
    }
    if let Some(denomination_id) = request.denomination_id {
        if product.denomination(denomination_id).is_none() {
            return Err(AppError::InvalidRequest(
                "Denomination does not belong to the product".to_string(),
            ));
        }
    }

    repo.get_store(request.store_id)
        .await?
        .ok_or(AppError::NotFound("Store"))?;

    let cards = (0..request.quantity)
        .map(|_| NewCard {
            code: identifier::generate_card_code(),
            key_code: request.with_key.then(identifier::generate_card_code),
            product_id: request.product_id,
            denomination_id: request.denomination_id,
            store_id: request.store_id,
        })
        .collect();

    let issued = repo.insert_cards(cards).await?;

    tracing::info!(
        product_id = %request.product_id,
        store_id = %request.store_id,
        count = issued.len(),
        "Issued cards"
    );

    Ok(issued
        .into_iter()
        .map(|record| IssuedCard {
            qr_payload: encoder.encode(&record.card.code),
            id: record.card.id,
            code: record.card.code,
            key_code: record.key.map(|k| k.code),
            created_at: record.card.created_at,
        })
        .collect())
}

/// Find a card (and its key) by identifier.
///
/// Returns `Ok(None)` when nothing matches, including inputs that cannot be
/// a card code. Found cards are cached for `ttl`; misses are not cached so
/// newly issued cards show up immediately.
pub async fn lookup_card(
    repo: &dyn Repository,
    cache: &dyn CacheStore,
    encoder: &QrEncoder,
    ttl: Duration,
    code: &str,
) -> Result<Option<CardLookup>, AppError> {
    let Some(code) = identifier::normalize_card_code(code) else {
        return Ok(None);
    };
    let key = lookup_cache_key(&code);

    match cache::get_cached::<CardLookup>(cache, &key).await {
        Ok(Some(hit)) => return Ok(Some(hit)),
        Ok(None) => {}
        Err(e) => tracing::warn!(key, error = %e, "Cache read failed, querying database"),
    }

    let Some((card, key_record)) = repo.find_card_by_code(&code).await? else {
        return Ok(None);
    };

    let lookup = CardLookup {
        qr_payload: encoder.encode(&card.card.code),
        card,
        key: key_record,
    };
    if let Err(e) = cache::set_cache(cache, &key, &lookup, ttl).await {
        tracing::warn!(key, error = %e, "Cache write failed");
    }

    Ok(Some(lookup))
}

/// Flip a card's activation flag.
///
/// # Arguments
///
/// * `current_status` - Activation state the caller last saw. When given
///   and different from the stored state, the toggle is refused as stale.
///
/// # Errors
///
/// - `NotFound`: no card with this id
/// - `Conflict`: card is redeemed, or the caller's view is stale
pub async fn toggle_activation(
    repo: &dyn Repository,
    cache: &dyn CacheStore,
    id: Uuid,
    current_status: Option<bool>,
) -> Result<ToggleOutcome, AppError> {
    let card = repo.get_card(id).await?.ok_or(AppError::NotFound("Card"))?;

    if card.is_redeemed {
        return Err(AppError::Conflict(
            "Redeemed cards cannot be activated or deactivated".to_string(),
        ));
    }
    if current_status.is_some_and(|seen| seen != card.is_activated) {
        return Err(AppError::Conflict(
            "Card status changed since it was loaded; refresh and try again".to_string(),
        ));
    }

    let Some(updated) = repo
        .set_activation(id, card.is_activated, !card.is_activated)
        .await?
    else {
        // Lost a race with another writer
        return match repo.get_card(id).await? {
            None => Err(AppError::NotFound("Card")),
            Some(_) => Err(AppError::Conflict(
                "Card was modified concurrently; refresh and try again".to_string(),
            )),
        };
    };

    evict_lookup(cache, &updated.code).await;

    tracing::info!(
        card_id = %updated.id,
        code = %updated.code,
        is_activated = updated.is_activated,
        "Toggled card activation"
    );

    Ok(ToggleOutcome {
        id: updated.id,
        is_activated: updated.is_activated,
    })
}

/// Permanently delete a card and its key.
///
/// # Errors
///
/// - `NotFound`: no card with this id
pub async fn delete_card(
    repo: &dyn Repository,
    cache: &dyn CacheStore,
    id: Uuid,
) -> Result<(), AppError> {
    let card = repo
        .delete_card(id)
        .await?
        .ok_or(AppError::NotFound("Card"))?;

    evict_lookup(cache, &card.code).await;

    tracing::info!(card_id = %card.id, code = %card.code, "Deleted card");

    Ok(())
}

/// Activated cards not yet reconciled into an invoice, grouped by store.
///
/// Groups are ordered by store name; cards inside a group by activation time.
pub async fn list_pending(
    repo: &dyn Repository,
    store_id: Option<Uuid>,
) -> Result<Vec<PendingGroup>, AppError> {
    let cards = repo.list_pending_cards(store_id).await?;
    Ok(group_by_store(cards))
}

fn group_by_store(cards: Vec<CardDetail>) -> Vec<PendingGroup> {
    let mut groups: Vec<PendingGroup> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for card in cards {
        let slot = *index.entry(card.card.store_id).or_insert_with(|| {
            groups.push(PendingGroup {
                store_id: card.card.store_id,
                store_name: card.store_name.clone(),
                card_count: 0,
                total_value_cents: 0,
                cards: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.card_count += 1;
        group.total_value_cents += card.value_cents;
        group.cards.push(card);
    }

    groups.sort_by(|a, b| a.store_name.cmp(&b.store_name));
    groups
}

/// Drop the cached lookup view of a card. Failures only warn.
pub async fn evict_lookup(cache: &dyn CacheStore, code: &str) {
    let key = lookup_cache_key(code);
    if let Err(e) = cache.remove(&key).await {
        tracing::warn!(key, error = %e, "Failed to evict cached card view");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryCache,
        models::{product::ProductWithDenominations, store::Store},
        repository::memory::MemoryRepository,
    };

    const TTL: Duration = Duration::from_secs(60);

    struct Fixture {
        repo: MemoryRepository,
        cache: MemoryCache,
        encoder: QrEncoder,
        store: Store,
        product: ProductWithDenominations,
    }

    fn fixture() -> Fixture {
        let repo = MemoryRepository::new();
        let store = repo.seed_store("Harbor Mall");
        let product = repo.seed_product("Coffee Card", true, &[("$10", 1_000), ("$25", 2_500)]);
        Fixture {
            repo,
            cache: MemoryCache::new(),
            encoder: QrEncoder::new("https://cards.example.com"),
            store,
            product,
        }
    }

    fn request(f: &Fixture, quantity: u32) -> IssueCardsRequest {
        IssueCardsRequest {
            product_id: f.product.product.id,
            denomination_id: Some(f.product.denominations[0].id),
            store_id: f.store.id,
            quantity,
            with_key: false,
        }
    }

    async fn issue_one(f: &Fixture) -> IssuedCard {
        issue_cards(&f.repo, &f.encoder, request(f, 1))
            .await
            .unwrap()
            .pop()
            .unwrap()
    }

    #[tokio::test]
    async fn issue_lookup_toggle_delete_scenario() {
        let f = fixture();
        let issued = issue_one(&f).await;
        assert_eq!(
            issued.qr_payload,
            format!("https://cards.example.com/scan/{}", issued.code)
        );

        let found = lookup_card(&f.repo, &f.cache, &f.encoder, TTL, &issued.code)
            .await
            .unwrap()
            .expect("card should be found");
        assert!(!found.card.card.is_activated);
        assert!(!found.card.card.is_redeemed);
        assert_eq!(found.card.product_name, "Coffee Card");

        let toggled = toggle_activation(&f.repo, &f.cache, issued.id, Some(false))
            .await
            .unwrap();
        assert!(toggled.is_activated);

        let found = lookup_card(&f.repo, &f.cache, &f.encoder, TTL, &issued.code)
            .await
            .unwrap()
            .unwrap();
        assert!(found.card.card.is_activated, "toggle must evict the cached view");

        delete_card(&f.repo, &f.cache, issued.id).await.unwrap();
        let gone = lookup_card(&f.repo, &f.cache, &f.encoder, TTL, &issued.code)
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn toggling_twice_restores_original_state() {
        let f = fixture();
        let issued = issue_one(&f).await;

        let first = toggle_activation(&f.repo, &f.cache, issued.id, None).await.unwrap();
        let second = toggle_activation(&f.repo, &f.cache, issued.id, None).await.unwrap();

        assert!(first.is_activated);
        assert!(!second.is_activated);
        let card = f.repo.get_card(issued.id).await.unwrap().unwrap();
        assert!(!card.is_activated);
        assert!(card.activated_at.is_none());
    }

    #[tokio::test]
    async fn toggle_unknown_card_is_not_found() {
        let f = fixture();
        let err = toggle_activation(&f.repo, &f.cache, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Card")));
    }

    #[tokio::test]
    async fn stale_current_status_is_refused() {
        let f = fixture();
        let issued = issue_one(&f).await;

        let err = toggle_activation(&f.repo, &f.cache, issued.id, Some(true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(!f.repo.get_card(issued.id).await.unwrap().unwrap().is_activated);
    }

    #[tokio::test]
    async fn delete_unknown_card_is_not_found() {
        let f = fixture();
        let err = delete_card(&f.repo, &f.cache, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Card")));
    }

    #[tokio::test]
    async fn batch_issue_with_keys() {
        let f = fixture();
        let mut req = request(&f, 25);
        req.with_key = true;

        let issued = issue_cards(&f.repo, &f.encoder, req).await.unwrap();
        assert_eq!(issued.len(), 25);
        assert_eq!(f.repo.card_count(), 25);
        assert!(issued.iter().all(|c| c.key_code.is_some()));

        let found = lookup_card(&f.repo, &f.cache, &f.encoder, TTL, &issued[0].code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.key.map(|k| k.code), issued[0].key_code);
    }

    #[tokio::test]
    async fn issue_rejects_inactive_product_and_bad_quantity() {
        let f = fixture();
        let retired = f.repo.seed_product("Retired Card", false, &[]);

        let mut req = request(&f, 1);
        req.product_id = retired.product.id;
        req.denomination_id = None;
        assert!(matches!(
            issue_cards(&f.repo, &f.encoder, req).await,
            Err(AppError::InvalidRequest(_))
        ));

        assert!(matches!(
            issue_cards(&f.repo, &f.encoder, request(&f, 0)).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            issue_cards(&f.repo, &f.encoder, request(&f, MAX_BATCH + 1)).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert_eq!(f.repo.card_count(), 0);
    }

    #[tokio::test]
    async fn issue_rejects_foreign_denomination_and_unknown_store() {
        let f = fixture();
        let other = f.repo.seed_product("Tea Card", true, &[("$5", 500)]);

        let mut req = request(&f, 1);
        req.denomination_id = Some(other.denominations[0].id);
        assert!(matches!(
            issue_cards(&f.repo, &f.encoder, req).await,
            Err(AppError::InvalidRequest(_))
        ));

        let mut req = request(&f, 1);
        req.store_id = Uuid::new_v4();
        assert!(matches!(
            issue_cards(&f.repo, &f.encoder, req).await,
            Err(AppError::NotFound("Store"))
        ));
    }

    #[tokio::test]
    async fn lookup_normalizes_and_reports_missing() {
        let f = fixture();
        let issued = issue_one(&f).await;

        let lowered = issued.code.to_lowercase();
        assert!(
            lookup_card(&f.repo, &f.cache, &f.encoder, TTL, &lowered)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            lookup_card(&f.repo, &f.cache, &f.encoder, TTL, "ZZZZZZZZ")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            lookup_card(&f.repo, &f.cache, &f.encoder, TTL, "not-a-code")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn pending_groups_by_store() {
        let f = fixture();
        let second_store = f.repo.seed_store("Airport");

        let a = issue_one(&f).await;
        let b = issue_one(&f).await;
        let _inactive = issue_one(&f).await;
        let mut req = request(&f, 1);
        req.store_id = second_store.id;
        let c = issue_cards(&f.repo, &f.encoder, req).await.unwrap().pop().unwrap();

        for id in [a.id, b.id, c.id] {
            toggle_activation(&f.repo, &f.cache, id, Some(false)).await.unwrap();
        }

        let groups = list_pending(&f.repo, None).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].store_name, "Airport");
        assert_eq!(groups[0].card_count, 1);
        assert_eq!(groups[1].store_name, "Harbor Mall");
        assert_eq!(groups[1].card_count, 2);
        assert_eq!(groups[1].total_value_cents, 2_000);

        let scoped = list_pending(&f.repo, Some(second_store.id)).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].cards[0].card.id, c.id);
    }
}
