//! Analytics query parameters, validated filters and rollup outputs.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationIssue;

/// Raw analytics query string. Every field is kept as text so that bad
/// values are reported as validation issues rather than extractor errors.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub store_id: Option<String>,
    pub product_id: Option<String>,
}

/// The four rollup families and the query parameters each one honors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsFamily {
    Financial,
    Inventory,
    Lifecycle,
    Products,
}

impl AnalyticsFamily {
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsFamily::Financial => "financial",
            AnalyticsFamily::Inventory => "inventory",
            AnalyticsFamily::Lifecycle => "lifecycle",
            AnalyticsFamily::Products => "products",
        }
    }

    fn accepts_dates(&self) -> bool {
        matches!(self, AnalyticsFamily::Financial | AnalyticsFamily::Products)
    }

    fn accepts_product(&self) -> bool {
        matches!(self, AnalyticsFamily::Products)
    }
}

/// Validated filter shared by all analytics queries.
///
/// `from` is inclusive and `until` exclusive. A bare `dateTo` date covers
/// that whole day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsFilter {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub store_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

impl AnalyticsFilter {
    /// Validate the parameters `family` accepts, collecting every issue.
    pub fn parse(family: AnalyticsFamily, query: &AnalyticsQuery) -> Result<Self, Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        let mut filter = AnalyticsFilter::default();

        if family.accepts_dates() {
            filter.from = collect(&mut issues, parse_from("dateFrom", query.date_from.as_deref()));
            filter.until = collect(&mut issues, parse_until("dateTo", query.date_to.as_deref()));
            if let (Some(from), Some(until)) = (filter.from, filter.until) {
                if from >= until {
                    issues.push(ValidationIssue::new(
                        "dateTo",
                        "dateTo must not be earlier than dateFrom",
                    ));
                }
            }
        }

        filter.store_id = collect(&mut issues, parse_uuid("storeId", query.store_id.as_deref()));
        if family.accepts_product() {
            filter.product_id =
                collect(&mut issues, parse_uuid("productId", query.product_id.as_deref()));
        }

        if issues.is_empty() { Ok(filter) } else { Err(issues) }
    }

    /// Cache key composed of the family name and every filter value.
    pub fn cache_key(&self, family: AnalyticsFamily) -> String {
        fn part<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_else(|| "*".to_string())
        }
        format!(
            "analytics:{}:{}:{}:{}:{}",
            family.name(),
            part(self.from.map(|d| d.to_rfc3339())),
            part(self.until.map(|d| d.to_rfc3339())),
            part(self.store_id),
            part(self.product_id),
        )
    }

    /// Whether `at` falls inside the date window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.until.is_none_or(|until| at < until)
    }
}

fn collect<T>(issues: &mut Vec<ValidationIssue>, parsed: Result<Option<T>, ValidationIssue>) -> Option<T> {
    parsed.unwrap_or_else(|issue| {
        issues.push(issue);
        None
    })
}

fn blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_from(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, ValidationIssue> {
    let Some(value) = blank(value) else {
        return Ok(None);
    };
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(instant.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| Some(date.and_time(NaiveTime::MIN).and_utc()))
        .map_err(|_| invalid_date(field))
}

fn parse_until(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, ValidationIssue> {
    let Some(value) = blank(value) else {
        return Ok(None);
    };
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(instant.with_timezone(&Utc) + TimeDelta::nanoseconds(1)));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid_date(field))?;
    let next = date.succ_opt().ok_or_else(|| invalid_date(field))?;
    Ok(Some(next.and_time(NaiveTime::MIN).and_utc()))
}

fn invalid_date(field: &str) -> ValidationIssue {
    ValidationIssue::new(
        field,
        "Expected a date (YYYY-MM-DD) or an RFC 3339 timestamp",
    )
}

fn parse_uuid(field: &str, value: Option<&str>) -> Result<Option<Uuid>, ValidationIssue> {
    blank(value)
        .map(|v| Uuid::parse_str(v).map_err(|_| ValidationIssue::new(field, "Expected a UUID")))
        .transpose()
}

/// Money flowing through cards and invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    pub issued_count: u64,
    pub issued_value_cents: i64,
    pub activated_count: u64,
    pub activated_value_cents: i64,
    pub redeemed_count: u64,
    pub redeemed_value_cents: i64,

    /// Activated but not yet invoiced
    pub outstanding_value_cents: i64,

    pub invoice_count: u64,
    pub invoiced_cents: i64,
    pub average_invoice_cents: i64,
    pub generated_at: DateTime<Utc>,
}

/// Card counts by lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMetrics {
    pub total_cards: u64,
    pub available: u64,
    pub activated: u64,
    pub redeemed: u64,
    pub products: Vec<ProductInventory>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInventory {
    pub product_id: Uuid,
    pub product_name: String,
    pub total: u64,
    pub available: u64,
    pub activated: u64,
    pub redeemed: u64,
}

/// Conversion rates between lifecycle stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleMetrics {
    pub issued: u64,
    pub activated: u64,
    pub redeemed: u64,

    /// activated / issued, 0 when nothing was issued
    pub activation_rate: f64,

    /// redeemed / activated, 0 when nothing was activated
    pub redemption_rate: f64,

    pub avg_hours_to_activation: Option<f64>,
    pub avg_hours_to_redemption: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMetrics {
    pub products: Vec<ProductPerformance>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPerformance {
    pub product_id: Uuid,
    pub product_name: String,
    pub issued: u64,
    pub activated: u64,
    pub redeemed: u64,
    pub redeemed_value_cents: i64,
    pub redemption_rate: f64,
}

/// Per-product card counts by state, aggregated by the repository.
///
/// States are disjoint: `available + activated + redeemed == total`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProductStateCounts {
    pub product_id: Uuid,
    pub product_name: String,
    pub total: i64,
    pub available: i64,
    pub activated: i64,
    pub redeemed: i64,
}

/// Lifecycle totals aggregated by the repository.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct LifecycleCounts {
    pub issued: i64,

    /// Cards activated at some point, redeemed ones included
    pub activated: i64,

    pub redeemed: i64,
    pub avg_secs_to_activation: Option<f64>,
    pub avg_secs_to_redemption: Option<f64>,
}
