//! Card (QR) HTTP handlers.
//!
//! - POST /api/qr - Issue one card or a batch
//! - GET /api/qr/pending - Activated cards awaiting an invoice, by store
//! - GET /api/qr/lookup/{code} - Lookup by identifier
//!
//! Store operators are limited to their own store.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    app::AppState,
    error::AppError,
    models::{
        card::{IssueCardsRequest, IssuedCard, LookupResponse, PendingGroup, PendingQuery},
        user::Claims,
    },
    services::card_service,
};

/// Issue cards.
///
/// # Endpoint
///
/// `POST /api/qr`
///
/// # Request Body
///
/// ```json
/// { "productId": "...", "denominationId": "...", "storeId": "...", "quantity": 20, "withKey": true }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: array of issued cards, each with `qrPayload`
/// - **Error (400)**: quantity out of range, inactive product, foreign denomination
/// - **Error (403)**: operator issuing for another store
/// - **Error (404)**: unknown product or store
/// - **Error (409)**: generated code collided, retry
pub async fn issue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<IssueCardsRequest>,
) -> Result<(StatusCode, Json<Vec<IssuedCard>>), AppError> {
    claims.scope_store(Some(request.store_id))?;

    let cards = card_service::issue_cards(state.repo.as_ref(), &state.qr, request).await?;
    Ok((StatusCode::CREATED, Json(cards)))
}

/// Pending activations grouped by store.
///
/// # Endpoint
///
/// `GET /api/qr/pending?storeId=...`
///
/// Admins see every store unless they filter; operators always get their own.
pub async fn pending(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<PendingGroup>>, AppError> {
    let store_id = claims.scope_store(query.store_id)?;
    let groups = card_service::list_pending(state.repo.as_ref(), store_id).await?;
    Ok(Json(groups))
}

/// Lookup by identifier.
///
/// # Endpoint
///
/// `GET /api/qr/lookup/{code}`
///
/// # Response
///
/// Always 200 unless the lookup itself fails:
///
/// ```json
/// { "found": true, "card": {...}, "key": {...}, "qrPayload": "https://.../scan/ABCD2345" }
/// { "found": false }
/// ```
pub async fn lookup(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<LookupResponse>, AppError> {
    let found = card_service::lookup_card(
        state.repo.as_ref(),
        state.cache.as_ref(),
        &state.qr,
        state.lookup_ttl,
        &code,
    )
    .await?;
    Ok(Json(found.into()))
}
