//! Analytics rollups over cards and invoices.
//!
//! Inventory and lifecycle are counted by the repository (SQL `GROUP BY` in
//! production); financial and product rollups fold the filtered card rows
//! because they need per-card values. Results are cached under `analytics:{family}:...` for the configured TTL; writes
//! do not evict them, so figures may lag by up to one TTL.

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    cache::{self, CacheStore},
    error::AppError,
    models::{
        analytics::{
            AnalyticsFamily, AnalyticsFilter, FinancialMetrics, InventoryMetrics, LifecycleCounts,
            LifecycleMetrics, ProductInventory, ProductMetrics, ProductPerformance,
            ProductStateCounts,
        },
        card::CardDetail,
        invoice::Invoice,
    },
    repository::Repository,
};

pub async fn financial(
    repo: &dyn Repository,
    cache: &dyn CacheStore,
    ttl: Duration,
    filter: &AnalyticsFilter,
) -> Result<FinancialMetrics, AppError> {
    let key = filter.cache_key(AnalyticsFamily::Financial);
    cache::cached(cache, &key, ttl, move || async move {
        let cards = repo.list_cards(filter).await?;
        let invoices = repo.list_invoices(filter).await?;
        Ok(summarize_financial(&cards, &invoices, Utc::now()))
    })
    .await
}

pub async fn inventory(
    repo: &dyn Repository,
    cache: &dyn CacheStore,
    ttl: Duration,
    filter: &AnalyticsFilter,
) -> Result<InventoryMetrics, AppError> {
    let key = filter.cache_key(AnalyticsFamily::Inventory);
    cache::cached(cache, &key, ttl, move || async move {
        let rows = repo.count_cards_by_product(filter).await?;
        Ok(summarize_inventory(&rows, Utc::now()))
    })
    .await
}

pub async fn lifecycle(
    repo: &dyn Repository,
    cache: &dyn CacheStore,
    ttl: Duration,
    filter: &AnalyticsFilter,
) -> Result<LifecycleMetrics, AppError> {
    let key = filter.cache_key(AnalyticsFamily::Lifecycle);
    cache::cached(cache, &key, ttl, move || async move {
        let counts = repo.lifecycle_counts(filter).await?;
        Ok(summarize_lifecycle(&counts, Utc::now()))
    })
    .await
}

pub async fn products(
    repo: &dyn Repository,
    cache: &dyn CacheStore,
    ttl: Duration,
    filter: &AnalyticsFilter,
) -> Result<ProductMetrics, AppError> {
    let key = filter.cache_key(AnalyticsFamily::Products);
    cache::cached(cache, &key, ttl, move || async move {
        let cards = repo.list_cards(filter).await?;
        Ok(summarize_products(&cards, Utc::now()))
    })
    .await
}

/// Redeemed cards were necessarily activated first.
fn ever_activated(card: &CardDetail) -> bool {
    card.card.is_activated || card.card.is_redeemed
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// SQL counts are never negative.
fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or_default()
}

fn hours(secs: Option<f64>) -> Option<f64> {
    secs.map(|s| s / 3600.0)
}

pub fn summarize_financial(
    cards: &[CardDetail],
    invoices: &[Invoice],
    generated_at: DateTime<Utc>,
) -> FinancialMetrics {
    let mut metrics = FinancialMetrics {
        issued_count: 0,
        issued_value_cents: 0,
        activated_count: 0,
        activated_value_cents: 0,
        redeemed_count: 0,
        redeemed_value_cents: 0,
        outstanding_value_cents: 0,
        invoice_count: invoices.len() as u64,
        invoiced_cents: invoices.iter().map(|i| i.total_cents).sum(),
        average_invoice_cents: 0,
        generated_at,
    };

    for card in cards {
        metrics.issued_count += 1;
        metrics.issued_value_cents += card.value_cents;
        if ever_activated(card) {
            metrics.activated_count += 1;
            metrics.activated_value_cents += card.value_cents;
        }
        if card.card.is_redeemed {
            metrics.redeemed_count += 1;
            metrics.redeemed_value_cents += card.value_cents;
        } else if card.card.is_activated {
            metrics.outstanding_value_cents += card.value_cents;
        }
    }

    if metrics.invoice_count > 0 {
        metrics.average_invoice_cents = metrics.invoiced_cents / metrics.invoice_count as i64;
    }
    metrics
}

pub fn summarize_inventory(rows: &[ProductStateCounts], generated_at: DateTime<Utc>) -> InventoryMetrics {
    let products: Vec<ProductInventory> = rows
        .iter()
        .map(|row| ProductInventory {
            product_id: row.product_id,
            product_name: row.product_name.clone(),
            total: count(row.total),
            available: count(row.available),
            activated: count(row.activated),
            redeemed: count(row.redeemed),
        })
        .collect();

    InventoryMetrics {
        total_cards: products.iter().map(|p| p.total).sum(),
        available: products.iter().map(|p| p.available).sum(),
        activated: products.iter().map(|p| p.activated).sum(),
        redeemed: products.iter().map(|p| p.redeemed).sum(),
        products,
        generated_at,
    }
}

pub fn summarize_lifecycle(counts: &LifecycleCounts, generated_at: DateTime<Utc>) -> LifecycleMetrics {
    let issued = count(counts.issued);
    let activated = count(counts.activated);
    let redeemed = count(counts.redeemed);

    LifecycleMetrics {
        issued,
        activated,
        redeemed,
        activation_rate: ratio(activated, issued),
        redemption_rate: ratio(redeemed, activated),
        avg_hours_to_activation: hours(counts.avg_secs_to_activation),
        avg_hours_to_redemption: hours(counts.avg_secs_to_redemption),
        generated_at,
    }
}

/// Per-product performance, best redeemed value first.
pub fn summarize_products(cards: &[CardDetail], generated_at: DateTime<Utc>) -> ProductMetrics {
    let mut by_product: HashMap<Uuid, ProductPerformance> = HashMap::new();

    for card in cards {
        let row = by_product
            .entry(card.card.product_id)
            .or_insert_with(|| ProductPerformance {
                product_id: card.card.product_id,
                product_name: card.product_name.clone(),
                issued: 0,
                activated: 0,
                redeemed: 0,
                redeemed_value_cents: 0,
                redemption_rate: 0.0,
            });
        row.issued += 1;
        if ever_activated(card) {
            row.activated += 1;
        }
        if card.card.is_redeemed {
            row.redeemed += 1;
            row.redeemed_value_cents += card.value_cents;
        }
    }

    let mut products: Vec<ProductPerformance> = by_product
        .into_values()
        .map(|mut row| {
            row.redemption_rate = ratio(row.redeemed, row.issued);
            row
        })
        .collect();
    products.sort_by(|a, b| {
        b.redeemed_value_cents
            .cmp(&a.redeemed_value_cents)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });

    ProductMetrics {
        products,
        generated_at,
    }
}
