//! HTTP API handlers for fenix-admin

pub mod auth;
pub mod buildinfo;
pub mod catalog;
pub mod chapters;
pub mod health;
pub mod mangas;
pub mod media;
pub mod pages;
pub mod users;

pub use auth::auth_routes;
pub use buildinfo::get_build_info;
pub use catalog::catalog_routes;
pub use chapters::chapter_routes;
pub use health::health_routes;
pub use mangas::manga_routes;
pub use media::media_routes;
pub use pages::page_routes;
pub use users::user_routes;

use fenix_common::storage::DEFAULT_URL_TTL;
use serde::Serialize;

use crate::error::ApiResult;
use crate::AppState;

/// Largest request body for cover and page uploads
pub const UPLOAD_BODY_LIMIT: usize = 12 * 1024 * 1024;

/// Largest request body for the ZIP page import
pub const ZIP_BODY_LIMIT: usize = 105 * 1024 * 1024;

/// Body of successful write operations that return no entity
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Browser-usable URL for an object key (empty key stays empty)
pub(crate) async fn object_url(state: &AppState, key: &str) -> ApiResult<String> {
    if key.is_empty() {
        return Ok(String::new());
    }
    Ok(state.media.presigned_url(key, DEFAULT_URL_TTL).await?)
}
