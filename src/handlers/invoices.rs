//! Invoice HTTP handlers.
//!
//! - POST /api/invoices - Redeem a store's pending cards into an invoice
//! - GET /api/invoices - List invoices
//! - GET /api/invoices/{id} - Invoice with its cards

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    models::{
        invoice::{GenerateInvoiceRequest, Invoice, InvoiceQuery, InvoiceWithCards},
        user::Claims,
    },
    services::invoice_service,
};

/// Generate an invoice.
///
/// # Endpoint
///
/// `POST /api/invoices`
///
/// # Request Body
///
/// ```json
/// { "storeId": "550e8400-e29b-41d4-a716-446655440000" }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: invoice with the cards it redeemed
/// - **Error (400)**: store has nothing pending
/// - **Error (403)**: operator invoicing another store
/// - **Error (404)**: unknown store
pub async fn generate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<GenerateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceWithCards>), AppError> {
    claims.scope_store(Some(request.store_id))?;

    let invoice = invoice_service::generate_invoice(
        state.repo.as_ref(),
        state.cache.as_ref(),
        request.store_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// List invoices, newest first.
///
/// `GET /api/invoices?storeId=...`
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let store_id = claims.scope_store(query.store_id)?;
    Ok(Json(
        invoice_service::list_invoices(state.repo.as_ref(), store_id).await?,
    ))
}

/// Invoice detail.
///
/// `GET /api/invoices/{id}`
///
/// Operators asking for another store's invoice get 404, same as a missing one.
pub async fn get(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceWithCards>, AppError> {
    let invoice = invoice_service::get_invoice(state.repo.as_ref(), id).await?;
    if claims.scope_store(Some(invoice.invoice.store_id)).is_err() {
        return Err(AppError::NotFound("Invoice"));
    }
    Ok(Json(invoice))
}
