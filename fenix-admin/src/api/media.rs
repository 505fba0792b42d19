//! Object URLs and media passthrough (admin)
//!
//! With S3 the browser loads images from presigned URLs. Backends that
//! cannot sign (local directory, memory) hand out `/media/{key}` paths,
//! which [`serve_object`] answers from the store.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use fenix_common::storage::DEFAULT_URL_TTL;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
    /// Seconds the URL stays valid
    pub expires_in: u64,
}

/// GET /api/media/url?key=
pub async fn get_object_url(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<UrlResponse>> {
    let key = query
        .key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing object key.".to_string()))?;

    let url = state.media.presigned_url(key, DEFAULT_URL_TTL).await?;
    Ok(Json(UrlResponse {
        url,
        expires_in: DEFAULT_URL_TTL.as_secs(),
    }))
}

/// GET /media/*key
pub async fn serve_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let object = state.media.get(&key).await?;
    debug!("Serving {} ({} bytes)", key, object.bytes.len());

    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static("private, max-age=3600")),
        ],
        object.bytes,
    ))
}

pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/api/media/url", get(get_object_url))
        .route("/media/*key", get(serve_object))
}
