//! Stores and products: the reference data cards are issued against.

use crate::{
    error::{AppError, ValidationIssue},
    models::{
        product::{CreateProductRequest, ProductWithDenominations},
        store::{CreateStoreRequest, NewStore, Store},
    },
    repository::Repository,
    services::identifier,
};

pub async fn list_stores(repo: &dyn Repository) -> Result<Vec<Store>, AppError> {
    repo.list_stores().await
}

/// Create a store with a freshly generated code.
///
/// # Errors
///
/// - `Validation`: blank name or address
/// - `NotFound`: company does not exist
/// - `Conflict`: the generated code is already in use (not retried)
pub async fn create_store(
    repo: &dyn Repository,
    request: CreateStoreRequest,
) -> Result<Store, AppError> {
    let mut issues = Vec::new();
    if request.name.trim().is_empty() {
        issues.push(ValidationIssue::new("name", "Name is required"));
    }
    if request.address.trim().is_empty() {
        issues.push(ValidationIssue::new("address", "Address is required"));
    }
    if !issues.is_empty() {
        return Err(AppError::Validation(issues));
    }

    let store = repo
        .create_store(NewStore {
            company_id: request.company_id,
            name: request.name.trim().to_string(),
            address: request.address.trim().to_string(),
            code: identifier::generate_store_code(),
            phone: request
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        })
        .await?;

    tracing::info!(store_id = %store.id, code = %store.code, "Created store");
    Ok(store)
}

pub async fn list_products(
    repo: &dyn Repository,
    include_inactive: bool,
) -> Result<Vec<ProductWithDenominations>, AppError> {
    repo.list_products(include_inactive).await
}

/// Create a product and its denominations in one step.
///
/// # Errors
///
/// - `Validation`: blank name, blank denomination label, non-positive value
pub async fn create_product(
    repo: &dyn Repository,
    mut request: CreateProductRequest,
) -> Result<ProductWithDenominations, AppError> {
    request.name = request.name.trim().to_string();

    let mut issues = Vec::new();
    if request.name.is_empty() {
        issues.push(ValidationIssue::new("name", "Name is required"));
    }
    for (i, denomination) in request.denominations.iter_mut().enumerate() {
        denomination.label = denomination.label.trim().to_string();
        if denomination.label.is_empty() {
            issues.push(ValidationIssue::new(
                format!("denominations.{i}.label"),
                "Label is required",
            ));
        }
        if denomination.value_cents <= 0 {
            issues.push(ValidationIssue::new(
                format!("denominations.{i}.valueCents"),
                "Value must be positive",
            ));
        }
    }
    if !issues.is_empty() {
        return Err(AppError::Validation(issues));
    }

    let product = repo.create_product(request).await?;

    tracing::info!(
        product_id = %product.product.id,
        denominations = product.denominations.len(),
        "Created product"
    );
    Ok(product)
}
