//! Public landing endpoint a scanned QR payload resolves to.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    app::AppState, error::AppError, models::card::ScanResponse, services::card_service,
};

/// Public view of a card.
///
/// # Endpoint
///
/// `GET /scan/{code}`
///
/// No authentication. Exposes only what a card holder needs: product,
/// value and whether the card is currently valid.
///
/// # Response
///
/// - **Success (200 OK)**: `{"code": "...", "productName": "...", "valid": true, ...}`
/// - **Error (404)**: no card with this code
pub async fn scan(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ScanResponse>, AppError> {
    let lookup = card_service::lookup_card(
        state.repo.as_ref(),
        state.cache.as_ref(),
        &state.qr,
        state.lookup_ttl,
        &code,
    )
    .await?
    .ok_or(AppError::NotFound("Card"))?;

    Ok(Json(lookup.into()))
}
