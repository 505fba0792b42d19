//! fenix-admin library - catalog administration service
//!
//! JSON/multipart API over the manga catalog: accounts, authors, artists,
//! genres, mangas, chapters and pages, with images kept in object storage.

use std::time::Duration;

use axum::Router;
use fenix_common::MediaStore;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cli;
pub mod db;
pub mod error;
pub mod extract;
pub mod forms;
pub mod import;
pub mod pagination;
pub mod session;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Image bucket
    pub media: MediaStore,
    /// Lifetime of a sign-in
    pub session_ttl: Duration,
    /// Mark the session cookie `Secure` (HTTPS deployments)
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(db: SqlitePool, media: MediaStore, session_ttl: Duration, secure_cookies: bool) -> Self {
        Self {
            db,
            media,
            session_ttl,
            secure_cookies,
        }
    }
}

/// Build application router
///
/// `/health` and `/auth/*` are public; every other route needs an admin
/// session.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    let protected = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::user_routes())
        .merge(api::catalog_routes())
        .merge(api::manga_routes())
        .merge(api::chapter_routes())
        .merge(api::page_routes())
        .merge(api::media_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_admin,
        ));

    let public = Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
