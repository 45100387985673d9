//! Store and product HTTP handlers.
//!
//! - GET /api/stores - List stores
//! - POST /api/stores - Create store with a generated code
//! - GET /api/products - List products with denominations
//! - POST /api/products - Create product with denominations

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    app::AppState,
    error::AppError,
    models::{
        product::{CreateProductRequest, ProductWithDenominations},
        store::{CreateStoreRequest, Store},
    },
    services::catalog_service,
};

/// List all stores ordered by name.
///
/// # Endpoint
///
/// `GET /api/stores`
///
/// # Response
///
/// - **Success (200 OK)**: JSON array of stores
/// - **Error (500)**: `{"error": {"code": "internal_error", ...}}`
pub async fn list_stores(State(state): State<AppState>) -> Result<Json<Vec<Store>>, AppError> {
    Ok(Json(catalog_service::list_stores(state.repo.as_ref()).await?))
}

/// Create a store.
///
/// # Endpoint
///
/// `POST /api/stores`
///
/// # Response
///
/// - **Success (201 Created)**: the store, including its generated `code`
/// - **Error (400)**: missing name or address
/// - **Error (404)**: unknown company
/// - **Error (409)**: generated code collided, retry
pub async fn create_store(
    State(state): State<AppState>,
    Json(request): Json<CreateStoreRequest>,
) -> Result<(StatusCode, Json<Store>), AppError> {
    let store = catalog_service::create_store(state.repo.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// List products and their denominations.
///
/// # Endpoint
///
/// `GET /api/products?includeInactive=true`
///
/// Inactive products are hidden unless `includeInactive` is set.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductWithDenominations>>, AppError> {
    let products =
        catalog_service::list_products(state.repo.as_ref(), query.include_inactive).await?;
    Ok(Json(products))
}

/// Create a product.
///
/// # Endpoint
///
/// `POST /api/products`
///
/// # Response
///
/// - **Success (201 Created)**: product with its denominations
/// - **Error (400)**: validation issues (blank name, non-positive value)
pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductWithDenominations>), AppError> {
    let product = catalog_service::create_product(state.repo.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}
