//! Chapter pages (admin)
//!
//! Pages are added in bulk through the ZIP import and then corrected one
//! at a time: a page can get a new image, a new number, or both.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post, put},
    Router,
};
use fenix_common::db::Page;
use fenix_common::storage::{content_type_for_extension, page_key};
use serde::Serialize;
use tracing::{info, warn};

use super::{object_url, ActionResponse, UPLOAD_BODY_LIMIT, ZIP_BODY_LIMIT};
use crate::db::{chapters, mangas, pages};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::forms::{MultipartForm, Validator};
use crate::import::{self, ImportReport};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PageView {
    #[serde(flatten)]
    pub page: Page,
    pub image_url: String,
}

/// Pages of one chapter with enough context for a page editor
#[derive(Debug, Serialize)]
pub struct ChapterPages {
    pub chapter_id: i64,
    pub chapter_number: f64,
    pub manga_id: i64,
    pub manga_title: String,
    pub pages: Vec<PageView>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: ImportReport,
}

const NO_CHANGES: &str = "No changes detected.";

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Page {} not found", id))
}

/// Extension of a stored page key, `webp` when it has none
fn key_extension(key: &str) -> &str {
    key.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.contains('/'))
        .unwrap_or("webp")
}

/// GET /api/chapters/:id/pages
pub async fn list_pages(
    State(state): State<AppState>,
    Path(chapter_id): Path<i64>,
) -> ApiResult<Json<ChapterPages>> {
    let chapter = chapters::find(&state.db, chapter_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Chapter {} not found", chapter_id)))?;
    let manga_title = mangas::title_of(&state.db, chapter.manga_id)
        .await?
        .unwrap_or_default();

    let rows = pages::list_for_chapter(&state.db, chapter_id).await?;
    let mut views = Vec::with_capacity(rows.len());
    for page in rows {
        let image_url = object_url(&state, &page.url).await?;
        views.push(PageView { page, image_url });
    }

    Ok(Json(ChapterPages {
        chapter_id,
        chapter_number: chapter.number,
        manga_id: chapter.manga_id,
        manga_title,
        pages: views,
    }))
}

/// POST /api/chapters/:id/pages/import (multipart field `zipfile`)
pub async fn import_pages(
    State(state): State<AppState>,
    Path(chapter_id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<Json<ImportResponse>> {
    let mut form = MultipartForm::read(multipart).await?;
    let archive = form
        .take_file("zipfile")
        .ok_or_else(|| ApiError::field("zipfile", "A ZIP file is required."))?;

    let report = import::import_zip(
        &state.db,
        &state.media,
        chapter_id,
        archive.file_name.as_deref(),
        archive.bytes.to_vec(),
    )
    .await?;

    Ok(Json(ImportResponse {
        success: true,
        report,
    }))
}

/// PUT /api/pages/:id (multipart `image` and/or `number`)
pub async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<Json<PageView>> {
    let mut form = MultipartForm::read(multipart).await?;

    let mut v = Validator::new();
    let number = match form.text("number").filter(|n| !n.trim().is_empty()) {
        Some(text) => v.positive_int("number", Some(text)),
        None => None,
    };
    let image = v.page_image("image", form.take_file("image"));
    v.finish()?;

    if number.is_none() && image.is_none() {
        return Err(ApiError::BadRequest(NO_CHANGES.to_string()));
    }

    let mut tx = state.db.begin().await?;
    let Some(located) = pages::find(&mut *tx, id).await? else {
        return Err(not_found(id));
    };
    let page = located.page;
    let target = number.unwrap_or(page.number);

    if target == page.number && image.is_none() {
        return Err(ApiError::BadRequest(NO_CHANGES.to_string()));
    }
    if target != page.number && pages::number_taken(&mut tx, page.chapter_id, target, id).await? {
        return Err(ApiError::Conflict(format!(
            "Page number {} already exists in this chapter.",
            target
        )));
    }

    let new_key = match &image {
        Some((_, extension)) => page_key(located.manga_id, page.chapter_id, target, extension),
        None => page_key(
            located.manga_id,
            page.chapter_id,
            target,
            key_extension(&page.url),
        ),
    };

    match image {
        Some((file, extension)) => {
            let content_type = content_type_for_extension(extension)
                .unwrap_or("application/octet-stream");
            state.media.put(&new_key, file.bytes, content_type).await?;

            let saved = async {
                pages::update(&mut tx, id, target, &new_key).await?;
                tx.commit().await
            }
            .await;
            if let Err(e) = saved {
                if new_key != page.url {
                    state.media.discard(&[new_key]).await;
                }
                return Err(e.into());
            }
            if new_key != page.url {
                state.media.discard(&[page.url.clone()]).await;
            }
        }
        None => {
            state.media.rename(&page.url, &new_key).await?;

            let saved = async {
                pages::update(&mut tx, id, target, &new_key).await?;
                tx.commit().await
            }
            .await;
            if let Err(e) = saved {
                if let Err(restore_err) = state.media.rename(&new_key, &page.url).await {
                    warn!(
                        "Could not move {} back to {}: {}",
                        new_key, page.url, restore_err
                    );
                }
                return Err(e.into());
            }
        }
    }

    info!("Page {} updated (number {}, key {})", id, target, new_key);
    let image_url = object_url(&state, &new_key).await?;
    Ok(Json(PageView {
        page: Page {
            number: target,
            url: new_key,
            ..page
        },
        image_url,
    }))
}

/// DELETE /api/pages/:id
pub async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ActionResponse>> {
    let mut tx = state.db.begin().await?;
    let deleted = async {
        let located = pages::find(&mut *tx, id).await?.ok_or_else(|| not_found(id))?;
        state.media.delete(&located.page.url).await?;
        pages::delete(&mut tx, id).await?;
        Ok::<_, ApiError>(())
    }
    .await;

    if let Err(e) = deleted {
        if let Err(rollback_err) = tx.rollback().await {
            warn!("Rollback failed: {}", rollback_err);
        }
        return Err(e);
    }
    tx.commit().await?;

    info!("Page {} deleted", id);
    Ok(Json(ActionResponse::ok("Page deleted.")))
}

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chapters/:id/pages", get(list_pages))
        .route(
            "/api/chapters/:id/pages/import",
            post(import_pages).layer(DefaultBodyLimit::max(ZIP_BODY_LIMIT)),
        )
        .route(
            "/api/pages/:id",
            put(update_page)
                .delete(delete_page)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}
