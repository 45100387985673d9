//! Shared application state and HTTP router.

use std::{sync::Arc, time::Duration};

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    cache::CacheStore, handlers, middleware::auth, repository::Repository,
    services::qr_payload::QrEncoder,
};

/// State shared by every handler.
///
/// Cheap to clone: backends sit behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub cache: Arc<dyn CacheStore>,
    pub qr: QrEncoder,

    /// Lifetime of cached analytics rollups
    pub analytics_ttl: Duration,

    /// Lifetime of cached card lookups
    pub lookup_ttl: Duration,
}

/// Build the HTTP router.
///
/// # Access
///
/// - Public: `/health`, `/scan/{code}`
/// - Session resolved but checked in the handler: `/api/auth/me`
/// - Any valid session: the remaining `/api/*` routes
/// - SUPER_ADMIN / SYSTEM_ADMIN only: `/api/analytics/*`
pub fn build_router(state: AppState) -> Router {
    let analytics_routes = Router::new()
        .route("/api/analytics/financial", get(handlers::analytics::financial))
        .route("/api/analytics/inventory", get(handlers::analytics::inventory))
        .route("/api/analytics/lifecycle", get(handlers::analytics::lifecycle))
        .route("/api/analytics/products", get(handlers::analytics::products))
        .route_layer(axum_middleware::from_fn(auth::require_admin));

    let session_routes = Router::new()
        // Catalog
        .route(
            "/api/stores",
            get(handlers::catalog::list_stores).post(handlers::catalog::create_store),
        )
        .route(
            "/api/products",
            get(handlers::catalog::list_products).post(handlers::catalog::create_product),
        )
        // Cards
        .route("/api/qr", post(handlers::qr::issue))
        .route("/api/qr/pending", get(handlers::qr::pending))
        .route("/api/qr/lookup/{code}", get(handlers::qr::lookup))
        // Server actions
        .route(
            "/api/actions/toggle-qr-status",
            post(handlers::actions::toggle_qr_status),
        )
        .route("/api/actions/delete-qr", post(handlers::actions::delete_qr))
        // Invoices
        .route(
            "/api/invoices",
            get(handlers::invoices::list).post(handlers::invoices::generate),
        )
        .route("/api/invoices/{id}", get(handlers::invoices::get))
        .route_layer(axum_middleware::from_fn(auth::require_session));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/scan/{code}", get(handlers::scan::scan))
        .route("/api/auth/me", get(handlers::auth::me))
        .merge(session_routes)
        .merge(analytics_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::resolve_session,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
