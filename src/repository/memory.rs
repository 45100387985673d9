//! In-memory repository used by unit and router tests.
//!
//! Mirrors the constraint behavior of the PostgreSQL schema: unique codes,
//! required foreign keys, and the compare-and-set activation update.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::hash_token,
    models::{
        analytics::{AnalyticsFilter, LifecycleCounts, ProductStateCounts},
        card::{Card, CardDetail, CardKey, IssuedRecord, NewCard},
        invoice::{Invoice, InvoiceWithCards},
        product::{CreateProductRequest, Denomination, NewDenomination, Product, ProductWithDenominations},
        store::{Company, NewStore, Store},
        user::{Role, SessionRow, User},
    },
};

use super::Repository;

#[derive(Debug, Default)]
struct State {
    companies: HashMap<Uuid, Company>,
    stores: HashMap<Uuid, Store>,
    products: HashMap<Uuid, Product>,
    denominations: HashMap<Uuid, Denomination>,
    cards: HashMap<Uuid, Card>,
    /// Keyed by card id
    keys: HashMap<Uuid, CardKey>,
    invoices: HashMap<Uuid, Invoice>,
    users: HashMap<Uuid, User>,
    /// Keyed by token hash
    sessions: HashMap<String, SessionRow>,
}

impl State {
    fn detail(&self, card: &Card) -> Result<CardDetail, AppError> {
        let product = self
            .products
            .get(&card.product_id)
            .ok_or(AppError::NotFound("Product"))?;
        let store = self.stores.get(&card.store_id).ok_or(AppError::NotFound("Store"))?;
        let denomination = card.denomination_id.and_then(|id| self.denominations.get(&id));

        Ok(CardDetail {
            card: card.clone(),
            product_name: product.name.clone(),
            store_name: store.name.clone(),
            denomination_label: denomination.map(|d| d.label.clone()),
            value_cents: denomination.map_or(0, |d| d.value_cents),
        })
    }

    fn details<'a>(&self, cards: impl Iterator<Item = &'a Card>) -> Result<Vec<CardDetail>, AppError> {
        cards.map(|card| self.detail(card)).collect()
    }

    fn product_with_denominations(&self, product: &Product) -> ProductWithDenominations {
        let mut denominations: Vec<Denomination> = self
            .denominations
            .values()
            .filter(|d| d.product_id == product.id)
            .cloned()
            .collect();
        denominations.sort_by_key(|d| d.value_cents);
        ProductWithDenominations {
            product: product.clone(),
            denominations,
        }
    }

    fn filtered<'a>(&'a self, filter: &'a AnalyticsFilter) -> impl Iterator<Item = &'a Card> + 'a {
        self.cards.values().filter(move |c| {
            filter.store_id.is_none_or(|s| c.store_id == s)
                && filter.product_id.is_none_or(|p| c.product_id == p)
                && filter.contains(c.created_at)
        })
    }

    fn code_taken(&self, code: &str) -> bool {
        self.cards.values().any(|c| c.code == code) || self.keys.values().any(|k| k.code == code)
    }
}

fn mean_secs(spans: &[chrono::TimeDelta]) -> Option<f64> {
    (!spans.is_empty()).then(|| {
        let total_ms: i64 = spans.iter().map(|span| span.num_milliseconds()).sum();
        total_ms as f64 / 1000.0 / spans.len() as f64
    })
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_company(&self, name: &str) -> Company {
        let company = Company {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.state.write().companies.insert(company.id, company.clone());
        company
    }

    pub fn seed_store(&self, name: &str) -> Store {
        let company = self.seed_company(&format!("{name} Holdings"));
        let store = Store {
            id: Uuid::new_v4(),
            company_id: company.id,
            name: name.to_string(),
            address: "1 Test Street".to_string(),
            code: crate::services::identifier::generate_store_code(),
            phone: None,
            created_at: Utc::now(),
        };
        self.state.write().stores.insert(store.id, store.clone());
        store
    }

    pub fn seed_product(&self, name: &str, is_active: bool, tiers: &[(&str, i64)]) -> ProductWithDenominations {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            is_active,
            created_at: Utc::now(),
        };
        let mut state = self.state.write();
        for (label, value_cents) in tiers {
            let denomination = Denomination {
                id: Uuid::new_v4(),
                product_id: product.id,
                label: label.to_string(),
                value_cents: *value_cents,
            };
            state.denominations.insert(denomination.id, denomination);
        }
        state.products.insert(product.id, product.clone());
        state.product_with_denominations(&product)
    }

    pub fn seed_user(&self, role: Role, store_id: Option<Uuid>) -> User {
        let id = Uuid::new_v4();
        let user = User {
            id,
            email: format!("{id}@example.com"),
            name: format!("{role} user"),
            role,
            company_id: None,
            store_id,
            created_at: Utc::now(),
        };
        self.state.write().users.insert(user.id, user.clone());
        user
    }

    pub fn seed_session(&self, token: &str, user: &User, expires_at: DateTime<Utc>) {
        let session = SessionRow {
            user_id: user.id,
            role: user.role.as_str().to_string(),
            company_id: user.company_id,
            store_id: user.store_id,
            expires_at,
        };
        self.state.write().sessions.insert(hash_token(token), session);
    }

    pub fn remove_user(&self, id: Uuid) {
        self.state.write().users.remove(&id);
    }

    /// Rewrite a card's timestamps, for analytics scenarios.
    pub fn backdate_card(
        &self,
        id: Uuid,
        created_at: DateTime<Utc>,
        activated_at: Option<DateTime<Utc>>,
    ) {
        if let Some(card) = self.state.write().cards.get_mut(&id) {
            card.created_at = created_at;
            if activated_at.is_some() {
                card.activated_at = activated_at;
            }
        }
    }

    pub fn card_count(&self) -> usize {
        self.state.read().cards.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn list_stores(&self) -> Result<Vec<Store>, AppError> {
        let mut stores: Vec<Store> = self.state.read().stores.values().cloned().collect();
        stores.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stores)
    }

    async fn get_store(&self, id: Uuid) -> Result<Option<Store>, AppError> {
        Ok(self.state.read().stores.get(&id).cloned())
    }

    async fn create_store(&self, new: NewStore) -> Result<Store, AppError> {
        let mut state = self.state.write();
        if !state.companies.contains_key(&new.company_id) {
            return Err(AppError::NotFound("Company"));
        }
        if state.stores.values().any(|s| s.code == new.code) {
            return Err(AppError::Conflict("Store code already in use".to_string()));
        }
        let store = Store {
            id: Uuid::new_v4(),
            company_id: new.company_id,
            name: new.name,
            address: new.address,
            code: new.code,
            phone: new.phone,
            created_at: Utc::now(),
        };
        state.stores.insert(store.id, store.clone());
        Ok(store)
    }

    async fn list_products(&self, include_inactive: bool) -> Result<Vec<ProductWithDenominations>, AppError> {
        let state = self.state.read();
        let mut products: Vec<ProductWithDenominations> = state
            .products
            .values()
            .filter(|p| include_inactive || p.is_active)
            .map(|p| state.product_with_denominations(p))
            .collect();
        products.sort_by(|a, b| a.product.name.cmp(&b.product.name));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<ProductWithDenominations>, AppError> {
        let state = self.state.read();
        Ok(state
            .products
            .get(&id)
            .map(|p| state.product_with_denominations(p)))
    }

    async fn create_product(&self, request: CreateProductRequest) -> Result<ProductWithDenominations, AppError> {
        let product = Product {
            id: Uuid::new_v4(),
            name: request.name,
            description: request.description,
            is_active: request.is_active,
            created_at: Utc::now(),
        };
        let mut state = self.state.write();
        for NewDenomination { label, value_cents } in request.denominations {
            let denomination = Denomination {
                id: Uuid::new_v4(),
                product_id: product.id,
                label,
                value_cents,
            };
            state.denominations.insert(denomination.id, denomination);
        }
        state.products.insert(product.id, product.clone());
        Ok(state.product_with_denominations(&product))
    }

    async fn insert_cards(&self, cards: Vec<NewCard>) -> Result<Vec<IssuedRecord>, AppError> {
        let mut state = self.state.write();

        // Validate the whole batch before touching state
        let mut batch_codes = std::collections::HashSet::new();
        for new_card in &cards {
            if !state.products.contains_key(&new_card.product_id)
                || !state.stores.contains_key(&new_card.store_id)
            {
                return Err(AppError::NotFound("Product or store"));
            }
            let codes = std::iter::once(&new_card.code).chain(new_card.key_code.as_ref());
            for code in codes {
                if state.code_taken(code) || !batch_codes.insert(code.clone()) {
                    return Err(AppError::Conflict(
                        "Card code collision, please retry".to_string(),
                    ));
                }
            }
        }

        let now = Utc::now();
        let mut issued = Vec::with_capacity(cards.len());
        for new_card in cards {
            let card = Card {
                id: Uuid::new_v4(),
                code: new_card.code,
                product_id: new_card.product_id,
                denomination_id: new_card.denomination_id,
                store_id: new_card.store_id,
                is_activated: false,
                is_redeemed: false,
                invoice_id: None,
                activated_at: None,
                redeemed_at: None,
                created_at: now,
            };
            let key = new_card.key_code.map(|code| CardKey {
                id: Uuid::new_v4(),
                card_id: card.id,
                code,
                created_at: now,
            });
            state.cards.insert(card.id, card.clone());
            if let Some(key) = &key {
                state.keys.insert(card.id, key.clone());
            }
            issued.push(IssuedRecord { card, key });
        }
        Ok(issued)
    }

    async fn get_card(&self, id: Uuid) -> Result<Option<Card>, AppError> {
        Ok(self.state.read().cards.get(&id).cloned())
    }

    async fn find_card_by_code(&self, code: &str) -> Result<Option<(CardDetail, Option<CardKey>)>, AppError> {
        let state = self.state.read();
        let Some(card) = state.cards.values().find(|c| c.code == code) else {
            return Ok(None);
        };
        let detail = state.detail(card)?;
        let key = state.keys.get(&card.id).cloned();
        Ok(Some((detail, key)))
    }

    async fn set_activation(&self, id: Uuid, from: bool, to: bool) -> Result<Option<Card>, AppError> {
        let mut state = self.state.write();
        let Some(card) = state.cards.get_mut(&id) else {
            return Ok(None);
        };
        if card.is_activated != from || card.is_redeemed {
            return Ok(None);
        }
        card.is_activated = to;
        card.activated_at = to.then(Utc::now);
        Ok(Some(card.clone()))
    }

    async fn delete_card(&self, id: Uuid) -> Result<Option<Card>, AppError> {
        let mut state = self.state.write();
        state.keys.remove(&id);
        Ok(state.cards.remove(&id))
    }

    async fn list_pending_cards(&self, store_id: Option<Uuid>) -> Result<Vec<CardDetail>, AppError> {
        let state = self.state.read();
        let mut pending: Vec<&Card> = state
            .cards
            .values()
            .filter(|c| c.is_pending() && store_id.is_none_or(|s| c.store_id == s))
            .collect();
        pending.sort_by(|a, b| (a.activated_at, &a.code).cmp(&(b.activated_at, &b.code)));
        state.details(pending.into_iter())
    }

    async fn list_cards(&self, filter: &AnalyticsFilter) -> Result<Vec<CardDetail>, AppError> {
        let state = self.state.read();
        let mut cards: Vec<&Card> = state.filtered(filter).collect();
        cards.sort_by_key(|c| c.created_at);
        state.details(cards.into_iter())
    }

    async fn count_cards_by_product(
        &self,
        filter: &AnalyticsFilter,
    ) -> Result<Vec<ProductStateCounts>, AppError> {
        let state = self.state.read();
        let mut by_product: HashMap<Uuid, ProductStateCounts> = HashMap::new();
        for card in state.filtered(filter) {
            let product = state
                .products
                .get(&card.product_id)
                .ok_or(AppError::NotFound("Product"))?;
            let row = by_product
                .entry(card.product_id)
                .or_insert_with(|| ProductStateCounts {
                    product_id: card.product_id,
                    product_name: product.name.clone(),
                    total: 0,
                    available: 0,
                    activated: 0,
                    redeemed: 0,
                });
            row.total += 1;
            if card.is_redeemed {
                row.redeemed += 1;
            } else if card.is_activated {
                row.activated += 1;
            } else {
                row.available += 1;
            }
        }
        let mut rows: Vec<ProductStateCounts> = by_product.into_values().collect();
        rows.sort_by(|a, b| a.product_name.cmp(&b.product_name));
        Ok(rows)
    }

    async fn lifecycle_counts(&self, filter: &AnalyticsFilter) -> Result<LifecycleCounts, AppError> {
        let state = self.state.read();
        let mut counts = LifecycleCounts::default();
        let mut to_activation = Vec::new();
        let mut to_redemption = Vec::new();
        for card in state.filtered(filter) {
            counts.issued += 1;
            if card.is_activated || card.is_redeemed {
                counts.activated += 1;
            }
            if card.is_redeemed {
                counts.redeemed += 1;
            }
            if let Some(activated_at) = card.activated_at {
                to_activation.push(activated_at - card.created_at);
                if let Some(redeemed_at) = card.redeemed_at {
                    to_redemption.push(redeemed_at - activated_at);
                }
            }
        }
        counts.avg_secs_to_activation = mean_secs(&to_activation);
        counts.avg_secs_to_redemption = mean_secs(&to_redemption);
        Ok(counts)
    }

    async fn redeem_pending(&self, store_id: Uuid, number: String) -> Result<Option<InvoiceWithCards>, AppError> {
        let mut state = self.state.write();
        if !state.stores.contains_key(&store_id) {
            return Err(AppError::NotFound("Store"));
        }
        if state.invoices.values().any(|i| i.number == number) {
            return Err(AppError::Conflict(
                "Invoice number collision, please retry".to_string(),
            ));
        }

        let pending: Vec<Uuid> = state
            .cards
            .values()
            .filter(|c| c.store_id == store_id && c.is_pending())
            .map(|c| c.id)
            .collect();
        if pending.is_empty() {
            return Ok(None);
        }

        let now = Utc::now();
        let invoice_id = Uuid::new_v4();
        let mut total_cents = 0;
        for id in &pending {
            let value = {
                let card = &state.cards[id];
                card.denomination_id
                    .and_then(|d| state.denominations.get(&d))
                    .map_or(0, |d| d.value_cents)
            };
            total_cents += value;
            if let Some(card) = state.cards.get_mut(id) {
                card.invoice_id = Some(invoice_id);
                card.is_redeemed = true;
                card.redeemed_at = Some(now);
            }
        }

        let invoice = Invoice {
            id: invoice_id,
            number,
            store_id,
            card_count: pending.len() as i32,
            total_cents,
            created_at: now,
        };
        state.invoices.insert(invoice.id, invoice.clone());

        let mut cards = state.details(pending.iter().map(|id| &state.cards[id]))?;
        cards.sort_by(|a, b| a.card.code.cmp(&b.card.code));
        Ok(Some(InvoiceWithCards { invoice, cards }))
    }

    async fn list_invoices(&self, filter: &AnalyticsFilter) -> Result<Vec<Invoice>, AppError> {
        let mut invoices: Vec<Invoice> = self
            .state
            .read()
            .invoices
            .values()
            .filter(|i| filter.store_id.is_none_or(|s| i.store_id == s) && filter.contains(i.created_at))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<InvoiceWithCards>, AppError> {
        let state = self.state.read();
        let Some(invoice) = state.invoices.get(&id).cloned() else {
            return Ok(None);
        };
        let mut cards = state.details(state.cards.values().filter(|c| c.invoice_id == Some(id)))?;
        cards.sort_by(|a, b| a.card.code.cmp(&b.card.code));
        Ok(Some(InvoiceWithCards { invoice, cards }))
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRow>, AppError> {
        Ok(self.state.read().sessions.get(token_hash).cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.read().users.get(&id).cloned())
    }
}
