//! Analytics HTTP handlers.
//!
//! All four endpoints are admin-only (enforced by the route layer) and share
//! the same shape: validate the query, fetch the cached rollup, attach
//! client cache headers.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    app::AppState,
    error::AppError,
    models::analytics::{AnalyticsFamily, AnalyticsFilter, AnalyticsQuery},
    services::analytics_service,
};

pub const ANALYTICS_CACHE_CONTROL: &str = "private, max-age=300, stale-while-revalidate=600";

fn filter(
    family: AnalyticsFamily,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<AnalyticsFilter, AppError> {
    let Query(query) = query?;
    AnalyticsFilter::parse(family, &query).map_err(AppError::Validation)
}

fn cacheable<T: Serialize>(body: T) -> Response {
    ([(header::CACHE_CONTROL, ANALYTICS_CACHE_CONTROL)], Json(body)).into_response()
}

/// Financial rollup.
///
/// # Endpoint
///
/// `GET /api/analytics/financial?dateFrom=2025-01-01&dateTo=2025-01-31&storeId=...`
///
/// # Response
///
/// - **Success (200 OK)**: issued/activated/redeemed values, invoice totals
/// - **Error (400)**: `{"error": {"code": "validation_error", "issues": [...]}}`
pub async fn financial(
    State(state): State<AppState>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let filter = filter(AnalyticsFamily::Financial, query)?;
    let metrics = analytics_service::financial(
        state.repo.as_ref(),
        state.cache.as_ref(),
        state.analytics_ttl,
        &filter,
    )
    .await?;
    Ok(cacheable(metrics))
}

/// Card counts by state, overall and per product.
///
/// `GET /api/analytics/inventory?storeId=...`
pub async fn inventory(
    State(state): State<AppState>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let filter = filter(AnalyticsFamily::Inventory, query)?;
    let metrics = analytics_service::inventory(
        state.repo.as_ref(),
        state.cache.as_ref(),
        state.analytics_ttl,
        &filter,
    )
    .await?;
    Ok(cacheable(metrics))
}

/// Activation/redemption rates and durations.
///
/// `GET /api/analytics/lifecycle?storeId=...`
pub async fn lifecycle(
    State(state): State<AppState>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let filter = filter(AnalyticsFamily::Lifecycle, query)?;
    let metrics = analytics_service::lifecycle(
        state.repo.as_ref(),
        state.cache.as_ref(),
        state.analytics_ttl,
        &filter,
    )
    .await?;
    Ok(cacheable(metrics))
}

/// Per-product performance.
///
/// `GET /api/analytics/products?dateFrom=...&dateTo=...&storeId=...&productId=...`
pub async fn products(
    State(state): State<AppState>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let filter = filter(AnalyticsFamily::Products, query)?;
    let metrics = analytics_service::products(
        state.repo.as_ref(),
        state.cache.as_ref(),
        state.analytics_ttl,
        &filter,
    )
    .await?;
    Ok(cacheable(metrics))
}
