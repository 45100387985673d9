//! Current-user endpoint.

use axum::{Extension, Json, extract::State};

use crate::{
    app::AppState,
    error::AppError,
    models::user::{Claims, MeResponse},
};

/// Return the user behind the current session.
///
/// # Endpoint
///
/// `GET /api/auth/me`
///
/// # Response
///
/// - **Success (200 OK)**: `{"user": {...}}`
/// - **Error (401)**: no valid session
/// - **Error (404)**: session refers to a user that no longer exists
pub async fn me(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
) -> Result<Json<MeResponse>, AppError> {
    let Some(Extension(claims)) = claims else {
        return Err(AppError::Unauthenticated);
    };

    let user = state
        .repo
        .get_user(claims.user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    Ok(Json(MeResponse { user }))
}
