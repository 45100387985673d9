//! Server actions invoked by the admin UI.
//!
//! - POST /api/actions/toggle-qr-status - Flip a card's activation
//! - POST /api/actions/delete-qr - Delete a card
//!
//! Both always answer 200 with an [`ActionResult`]; every failure, including
//! a malformed body, is reported as `{"success": false, "error": "..."}`.
//! Store operators may only act on their own store's cards; anything else
//! reads as `Card not found`.

use axum::{Extension, Json, extract::State, extract::rejection::JsonRejection};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    models::{
        action::ActionResult,
        card::{DeleteQrRequest, ToggleOutcome, ToggleQrStatusRequest},
        user::Claims,
    },
    services::card_service,
};

fn card_id(raw: &str) -> Result<Uuid, AppError> {
    // Unparseable ids cannot name an existing card
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound("Card"))
}

/// Resolves the card id and checks it belongs to a store the caller may touch.
async fn authorized_card(state: &AppState, claims: &Claims, raw: &str) -> Result<Uuid, AppError> {
    let id = card_id(raw)?;
    let card = state
        .repo
        .get_card(id)
        .await?
        .ok_or(AppError::NotFound("Card"))?;
    claims
        .scope_store(Some(card.store_id))
        .map_err(|_| AppError::NotFound("Card"))?;
    Ok(id)
}

/// Toggle activation.
///
/// # Request Body
///
/// ```json
/// { "id": "550e8400-e29b-41d4-a716-446655440000", "currentStatus": false }
/// ```
///
/// # Response (200 OK)
///
/// ```json
/// { "success": true, "data": { "id": "...", "isActivated": true } }
/// { "success": false, "error": "Card not found" }
/// ```
pub async fn toggle_qr_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<ToggleQrStatusRequest>, JsonRejection>,
) -> Json<ActionResult<ToggleOutcome>> {
    let result = async {
        let Json(request) = payload?;
        let id = authorized_card(&state, &claims, &request.id).await?;
        card_service::toggle_activation(
            state.repo.as_ref(),
            state.cache.as_ref(),
            id,
            request.current_status,
        )
        .await
    }
    .await;

    Json(result.into())
}

/// Delete a card.
///
/// # Request Body
///
/// ```json
/// { "id": "550e8400-e29b-41d4-a716-446655440000" }
/// ```
///
/// # Response (200 OK)
///
/// `{"success": true}` or `{"success": false, "error": "..."}`
pub async fn delete_qr(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<DeleteQrRequest>, JsonRejection>,
) -> Json<ActionResult<()>> {
    let result = async {
        let Json(request) = payload?;
        let id = authorized_card(&state, &claims, &request.id).await?;
        card_service::delete_card(state.repo.as_ref(), state.cache.as_ref(), id).await
    }
    .await;

    Json(match result {
        Ok(()) => ActionResult::done(),
        Err(err) => ActionResult::failed(&err),
    })
}
