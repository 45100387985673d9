//! Session authentication and role gating.
//!
//! Sessions are issued by the external login flow. This module:
//! 1. Extracts the session token from `Authorization: Bearer` or the `session` cookie
//! 2. Hashes it and looks the session up
//! 3. Injects typed [`Claims`] into the request
//! 4. Gates routes on the presence of a session or on an admin role

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Uri, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::{app::AppState, error::AppError, models::user::Claims};

/// Name of the cookie carrying the session token for browser requests.
pub const SESSION_COOKIE: &str = "session";

/// SHA-256 hex digest of a session token, as stored in `sessions.token_hash`.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    if let Some(token) = bearer {
        return Some(token.trim());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
}

/// Resolve the caller's session into [`Claims`].
///
/// # Flow
///
/// 1. Extract the token (bearer header first, then cookie)
/// 2. Hash the token using SHA-256
/// 3. Look up the session by hash and check `expires_at`
/// 4. If valid: insert `Claims` into request extensions
///
/// Never rejects: anonymous requests continue without claims and the
/// gates below decide what to do with them.
pub async fn resolve_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token_hash = session_token(request.headers())
        .filter(|token| !token.is_empty())
        .map(hash_token);

    if let Some(token_hash) = token_hash {
        match state.repo.find_session(&token_hash).await? {
            Some(session) if session.expires_at > Utc::now() => {
                let claims = Claims::try_from(session)?;
                request.extensions_mut().insert(claims);
            }
            Some(_) => tracing::debug!("Ignoring expired session"),
            None => tracing::debug!("Unknown session token"),
        }
    }

    Ok(next.run(request).await)
}

/// Reject requests without a resolved session with 401.
pub async fn require_session(request: Request, next: Next) -> Result<Response, AppError> {
    if request.extensions().get::<Claims>().is_none() {
        return Err(AppError::Unauthenticated);
    }
    Ok(next.run(request).await)
}

/// Allow only SUPER_ADMIN and SYSTEM_ADMIN through.
///
/// Browser navigations are redirected to the login page with a
/// `callbackUrl` back to the requested path; API calls get 401 (no
/// session) or 403 (wrong role) JSON.
pub async fn require_admin(request: Request, next: Next) -> Response {
    let role = request.extensions().get::<Claims>().map(|c| c.role);

    match role {
        Some(role) if role.is_admin() => next.run(request).await,
        _ if wants_html(request.headers()) => login_redirect(request.uri()).into_response(),
        Some(_) => AppError::Forbidden.into_response(),
        None => AppError::Unauthenticated.into_response(),
    }
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn login_redirect(uri: &Uri) -> Redirect {
    let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let callback: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    Redirect::to(&format!("/login?callbackUrl={callback}"))
}
