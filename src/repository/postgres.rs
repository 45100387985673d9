//! PostgreSQL repository backed by a sqlx connection pool.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        analytics::{AnalyticsFilter, LifecycleCounts, ProductStateCounts},
        card::{Card, CardDetail, CardKey, IssuedRecord, NewCard},
        invoice::{Invoice, InvoiceWithCards},
        product::{CreateProductRequest, Denomination, Product, ProductWithDenominations},
        store::{NewStore, Store},
        user::{SessionRow, User, UserRow},
    },
};

use super::Repository;

/// Card columns joined with product, store and denomination.
///
/// Callers append their own `WHERE` / `ORDER BY`.
const CARD_DETAIL_SELECT: &str = r#"
    SELECT c.id, c.code, c.product_id, c.denomination_id, c.store_id,
           c.is_activated, c.is_redeemed, c.invoice_id,
           c.activated_at, c.redeemed_at, c.created_at,
           p.name AS product_name,
           s.name AS store_name,
           d.label AS denomination_label,
           COALESCE(d.value_cents, 0) AS value_cents
    FROM cards c
    JOIN products p ON p.id = c.product_id
    JOIN stores s ON s.id = c.store_id
    LEFT JOIN denominations d ON d.id = c.denomination_id
"#;

/// Analytics filter over `cards c`; binds store, product, from, until as `$1..$4`.
const CARD_FILTER_WHERE: &str = r#"
    WHERE ($1::uuid IS NULL OR c.store_id = $1)
      AND ($2::uuid IS NULL OR c.product_id = $2)
      AND ($3::timestamptz IS NULL OR c.created_at >= $3)
      AND ($4::timestamptz IS NULL OR c.created_at < $4)
"#;

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Attach denominations to a page of products, preserving product order.
    async fn with_denominations(
        &self,
        products: Vec<Product>,
    ) -> Result<Vec<ProductWithDenominations>, AppError> {
        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let denominations = sqlx::query_as::<_, Denomination>(
            r#"
            SELECT id, product_id, label, value_cents
            FROM denominations
            WHERE product_id = ANY($1)
            ORDER BY value_cents ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_product: HashMap<Uuid, Vec<Denomination>> = HashMap::new();
        for denomination in denominations {
            by_product
                .entry(denomination.product_id)
                .or_default()
                .push(denomination);
        }

        Ok(products
            .into_iter()
            .map(|product| ProductWithDenominations {
                denominations: by_product.remove(&product.id).unwrap_or_default(),
                product,
            })
            .collect())
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_stores(&self) -> Result<Vec<Store>, AppError> {
        let stores = sqlx::query_as::<_, Store>(
            "SELECT id, company_id, name, address, code, phone, created_at FROM stores ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(stores)
    }

    async fn get_store(&self, id: Uuid) -> Result<Option<Store>, AppError> {
        let store = sqlx::query_as::<_, Store>(
            "SELECT id, company_id, name, address, code, phone, created_at FROM stores WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(store)
    }

    async fn create_store(&self, store: NewStore) -> Result<Store, AppError> {
        sqlx::query_as::<_, Store>(
            r#"
            INSERT INTO stores (company_id, name, address, code, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, company_id, name, address, code, phone, created_at
            "#,
        )
        .bind(store.company_id)
        .bind(store.name)
        .bind(store.address)
        .bind(store.code)
        .bind(store.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_write(e, "Store code already in use", "Company"))
    }

    async fn list_products(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<ProductWithDenominations>, AppError> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, is_active, created_at
            FROM products
            WHERE is_active OR $1
            ORDER BY name ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        self.with_denominations(products).await
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<ProductWithDenominations>, AppError> {
        let Some(product) = sqlx::query_as::<_, Product>(
            "SELECT id, name, description, is_active, created_at FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        Ok(self.with_denominations(vec![product]).await?.pop())
    }

    async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductWithDenominations, AppError> {
        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, description, is_active)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, is_active, created_at
            "#,
        )
        .bind(request.name)
        .bind(request.description)
        .bind(request.is_active)
        .fetch_one(&mut *tx)
        .await?;

        let mut denominations = Vec::with_capacity(request.denominations.len());
        for denomination in request.denominations {
            let row = sqlx::query_as::<_, Denomination>(
                r#"
                INSERT INTO denominations (product_id, label, value_cents)
                VALUES ($1, $2, $3)
                RETURNING id, product_id, label, value_cents
                "#,
            )
            .bind(product.id)
            .bind(denomination.label)
            .bind(denomination.value_cents)
            .fetch_one(&mut *tx)
            .await?;
            denominations.push(row);
        }

        tx.commit().await?;

        Ok(ProductWithDenominations {
            product,
            denominations,
        })
    }

    async fn insert_cards(&self, cards: Vec<NewCard>) -> Result<Vec<IssuedRecord>, AppError> {
        let write_err = |e: sqlx::Error| {
            AppError::from_write(e, "Card code collision, please retry", "Product or store")
        };

        // All cards of a batch land together or not at all
        let mut tx = self.pool.begin().await?;
        let mut issued = Vec::with_capacity(cards.len());

        for new_card in cards {
            let card = sqlx::query_as::<_, Card>(
                r#"
                INSERT INTO cards (code, product_id, denomination_id, store_id)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(&new_card.code)
            .bind(new_card.product_id)
            .bind(new_card.denomination_id)
            .bind(new_card.store_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(write_err)?;

            let key = match new_card.key_code {
                Some(key_code) => Some(
                    sqlx::query_as::<_, CardKey>(
                        "INSERT INTO card_keys (card_id, code) VALUES ($1, $2) RETURNING *",
                    )
                    .bind(card.id)
                    .bind(key_code)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(write_err)?,
                ),
                None => None,
            };

            issued.push(IssuedRecord { card, key });
        }

        tx.commit().await?;

        Ok(issued)
    }

    async fn get_card(&self, id: Uuid) -> Result<Option<Card>, AppError> {
        let card = sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(card)
    }

    async fn find_card_by_code(
        &self,
        code: &str,
    ) -> Result<Option<(CardDetail, Option<CardKey>)>, AppError> {
        let Some(detail) =
            sqlx::query_as::<_, CardDetail>(&format!("{CARD_DETAIL_SELECT} WHERE c.code = $1"))
                .bind(code)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let key = sqlx::query_as::<_, CardKey>("SELECT * FROM card_keys WHERE card_id = $1")
            .bind(detail.card.id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(Some((detail, key)))
    }

    async fn set_activation(&self, id: Uuid, from: bool, to: bool) -> Result<Option<Card>, AppError> {
        // Compare-and-set so a stale caller cannot flip the flag twice
        let card = sqlx::query_as::<_, Card>(
            r#"
            UPDATE cards
            SET is_activated = $3,
                activated_at = CASE WHEN $3 THEN NOW() ELSE NULL END
            WHERE id = $1 AND is_activated = $2 AND NOT is_redeemed
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn delete_card(&self, id: Uuid) -> Result<Option<Card>, AppError> {
        let card = sqlx::query_as::<_, Card>("DELETE FROM cards WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(card)
    }

    async fn list_pending_cards(&self, store_id: Option<Uuid>) -> Result<Vec<CardDetail>, AppError> {
        let cards = sqlx::query_as::<_, CardDetail>(&format!(
            r#"{CARD_DETAIL_SELECT}
            WHERE c.is_activated AND c.invoice_id IS NULL
              AND ($1::uuid IS NULL OR c.store_id = $1)
            ORDER BY c.activated_at ASC NULLS LAST, c.code ASC
            "#
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    async fn list_cards(&self, filter: &AnalyticsFilter) -> Result<Vec<CardDetail>, AppError> {
        let cards = sqlx::query_as::<_, CardDetail>(&format!(
            "{CARD_DETAIL_SELECT} {CARD_FILTER_WHERE} ORDER BY c.created_at ASC"
        ))
        .bind(filter.store_id)
        .bind(filter.product_id)
        .bind(filter.from)
        .bind(filter.until)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    async fn count_cards_by_product(
        &self,
        filter: &AnalyticsFilter,
    ) -> Result<Vec<ProductStateCounts>, AppError> {
        let rows = sqlx::query_as::<_, ProductStateCounts>(&format!(
            r#"
            SELECT c.product_id,
                   p.name AS product_name,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE NOT c.is_activated AND NOT c.is_redeemed) AS available,
                   COUNT(*) FILTER (WHERE c.is_activated AND NOT c.is_redeemed) AS activated,
                   COUNT(*) FILTER (WHERE c.is_redeemed) AS redeemed
            FROM cards c
            JOIN products p ON p.id = c.product_id
            {CARD_FILTER_WHERE}
            GROUP BY c.product_id, p.name
            ORDER BY p.name ASC
            "#
        ))
        .bind(filter.store_id)
        .bind(filter.product_id)
        .bind(filter.from)
        .bind(filter.until)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn lifecycle_counts(&self, filter: &AnalyticsFilter) -> Result<LifecycleCounts, AppError> {
        let counts = sqlx::query_as::<_, LifecycleCounts>(&format!(
            r#"
            SELECT COUNT(*) AS issued,
                   COUNT(*) FILTER (WHERE c.is_activated OR c.is_redeemed) AS activated,
                   COUNT(*) FILTER (WHERE c.is_redeemed) AS redeemed,
                   AVG(EXTRACT(EPOCH FROM (c.activated_at - c.created_at)))::float8
                       AS avg_secs_to_activation,
                   AVG(EXTRACT(EPOCH FROM (c.redeemed_at - c.activated_at)))::float8
                       AS avg_secs_to_redemption
            FROM cards c
            {CARD_FILTER_WHERE}
            "#
        ))
        .bind(filter.store_id)
        .bind(filter.product_id)
        .bind(filter.from)
        .bind(filter.until)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }

    async fn redeem_pending(
        &self,
        store_id: Uuid,
        number: String,
    ) -> Result<Option<InvoiceWithCards>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Lock the pending cards so a concurrent invoice cannot claim them
        let pending = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT c.id, COALESCE(d.value_cents, 0)
            FROM cards c
            LEFT JOIN denominations d ON d.id = c.denomination_id
            WHERE c.store_id = $1 AND c.is_activated AND c.invoice_id IS NULL
            FOR UPDATE OF c
            "#,
        )
        .bind(store_id)
        .fetch_all(&mut *tx)
        .await?;

        if pending.is_empty() {
            tx.rollback().await?;
            return Ok(None);
        }

        let ids: Vec<Uuid> = pending.iter().map(|(id, _)| *id).collect();
        let total_cents: i64 = pending.iter().map(|(_, value)| value).sum();
        let card_count = i32::try_from(ids.len())
            .map_err(|_| AppError::InvalidRequest("Too many cards for one invoice".to_string()))?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (number, store_id, card_count, total_cents)
            VALUES ($1, $2, $3, $4)
            RETURNING id, number, store_id, card_count, total_cents, created_at
            "#,
        )
        .bind(number)
        .bind(store_id)
        .bind(card_count)
        .bind(total_cents)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_write(e, "Invoice number collision, please retry", "Store"))?;

        sqlx::query(
            r#"
            UPDATE cards
            SET invoice_id = $1, is_redeemed = true, redeemed_at = NOW()
            WHERE id = ANY($2)
            "#,
        )
        .bind(invoice.id)
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

        let cards = sqlx::query_as::<_, CardDetail>(&format!(
            "{CARD_DETAIL_SELECT} WHERE c.invoice_id = $1 ORDER BY c.code ASC"
        ))
        .bind(invoice.id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(InvoiceWithCards { invoice, cards }))
    }

    async fn list_invoices(&self, filter: &AnalyticsFilter) -> Result<Vec<Invoice>, AppError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, number, store_id, card_count, total_cents, created_at
            FROM invoices
            WHERE ($1::uuid IS NULL OR store_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.store_id)
        .bind(filter.from)
        .bind(filter.until)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<InvoiceWithCards>, AppError> {
        let Some(invoice) = sqlx::query_as::<_, Invoice>(
            "SELECT id, number, store_id, card_count, total_cents, created_at FROM invoices WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let cards = sqlx::query_as::<_, CardDetail>(&format!(
            "{CARD_DETAIL_SELECT} WHERE c.invoice_id = $1 ORDER BY c.code ASC"
        ))
        .bind(invoice.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(InvoiceWithCards { invoice, cards }))
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRow>, AppError> {
        let session = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT user_id, role, company_id, store_id, expires_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, email, name, role, company_id, store_id, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }
}
