//! Chapters of a manga (admin)

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Router,
};
use fenix_common::db::{format_chapter_number, Chapter};
use fenix_common::storage::{chapter_prefix, chapter_thumbnail_key};
use serde::Serialize;
use tracing::{info, warn};

use super::{object_url, ActionResponse, UPLOAD_BODY_LIMIT};
use crate::db::{chapters, mangas};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::forms::{MultipartForm, UploadedFile, Validator};
use crate::pagination::{calculate_pagination, ListQuery, Paginated, PAGE_SIZE};
use crate::session::CurrentUser;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ChapterView {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub thumbnail_url: String,
}

impl ChapterView {
    async fn build(state: &AppState, chapter: Chapter) -> ApiResult<Self> {
        let thumbnail_url = object_url(state, &chapter.thumbnail).await?;
        Ok(Self {
            chapter,
            thumbnail_url,
        })
    }
}

struct ChapterForm {
    number: f64,
    title: String,
    thumbnail: Option<UploadedFile>,
}

fn validate(mut form: MultipartForm, thumbnail_required: bool) -> ApiResult<ChapterForm> {
    let mut v = Validator::new();
    let number = v.positive_number("number", form.text("number"));
    let title = form.text("title").map(str::trim).unwrap_or_default().to_string();
    let thumbnail = v.cover("thumbnail", form.take_file("thumbnail"), thumbnail_required);

    v.finish()?;
    let Some(number) = number else {
        return Err(ApiError::Internal("validated number missing".to_string()));
    };

    Ok(ChapterForm {
        number,
        title,
        thumbnail,
    })
}

fn duplicate_number(number: f64) -> ApiError {
    ApiError::Conflict(format!(
        "Chapter number {} already exists for this manga.",
        format_chapter_number(number)
    ))
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Chapter {} not found", id))
}

/// GET /api/mangas/:id/chapters?page=&query=
pub async fn list_chapters(
    State(state): State<AppState>,
    Path(manga_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<ChapterView>>> {
    if mangas::title_of(&state.db, manga_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Manga {} not found", manga_id)));
    }

    let search = query.search();
    let total = chapters::count(&state.db, manga_id, search).await?;
    let pagination = calculate_pagination(total, query.page());
    let rows =
        chapters::list_page(&state.db, manga_id, search, pagination.offset, PAGE_SIZE).await?;

    let mut items = Vec::with_capacity(rows.len());
    for chapter in rows {
        items.push(ChapterView::build(&state, chapter).await?);
    }
    Ok(Json(Paginated::new(items, total, pagination)))
}

/// POST /api/mangas/:id/chapters (multipart)
pub async fn create_chapter(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(manga_id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ChapterView>)> {
    let form = MultipartForm::read(multipart).await?;
    let ChapterForm {
        number,
        title,
        thumbnail,
    } = validate(form, true)?;
    let cover = thumbnail.ok_or_else(|| ApiError::field("thumbnail", "An image is required."))?;

    if mangas::title_of(&state.db, manga_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Manga {} not found", manga_id)));
    }

    let mut uploaded = Vec::new();
    let mut tx = state.db.begin().await?;

    let created = async {
        if chapters::number_taken(&mut tx, manga_id, number, None).await? {
            return Err(duplicate_number(number));
        }
        let id = chapters::insert(&mut tx, manga_id, number, &title, user.id).await?;

        let key = chapter_thumbnail_key(manga_id, id);
        state.media.put(&key, cover.bytes, "image/webp").await?;
        uploaded.push(key.clone());
        chapters::set_thumbnail(&mut tx, id, &key).await?;
        Ok::<_, ApiError>(id)
    }
    .await;

    let id = match created {
        Ok(id) => id,
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            }
            state.media.discard(&uploaded).await;
            return Err(e);
        }
    };
    if let Err(e) = tx.commit().await {
        state.media.discard(&uploaded).await;
        return Err(e.into());
    }

    info!(
        "Chapter {} ({}) added to manga {} by user {}",
        id,
        format_chapter_number(number),
        manga_id,
        user.id
    );
    let chapter = chapters::find(&state.db, id).await?.ok_or_else(|| not_found(id))?;
    Ok((StatusCode::CREATED, Json(ChapterView::build(&state, chapter).await?)))
}

/// PUT /api/chapters/:id (multipart)
pub async fn update_chapter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<Json<ChapterView>> {
    let form = MultipartForm::read(multipart).await?;
    let ChapterForm {
        number,
        title,
        thumbnail,
    } = validate(form, false)?;

    let mut tx = state.db.begin().await?;
    let updated = async {
        let chapter = chapters::find(&mut *tx, id).await?.ok_or_else(|| not_found(id))?;
        if chapters::number_taken(&mut tx, chapter.manga_id, number, Some(id)).await? {
            return Err(duplicate_number(number));
        }
        chapters::update(&mut tx, id, number, &title).await?;

        if let Some(cover) = thumbnail {
            let key = chapter_thumbnail_key(chapter.manga_id, id);
            state.media.put(&key, cover.bytes, "image/webp").await?;
            chapters::set_thumbnail(&mut tx, id, &key).await?;
        }
        Ok::<_, ApiError>(())
    }
    .await;

    if let Err(e) = updated {
        if let Err(rollback_err) = tx.rollback().await {
            warn!("Rollback failed: {}", rollback_err);
        }
        return Err(e);
    }
    tx.commit().await?;

    info!("Chapter {} updated", id);
    let chapter = chapters::find(&state.db, id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(ChapterView::build(&state, chapter).await?))
}

/// DELETE /api/chapters/:id
///
/// Objects go first; if that fails the row stays so the delete can be retried.
pub async fn delete_chapter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ActionResponse>> {
    let mut tx = state.db.begin().await?;
    let deleted = async {
        let chapter = chapters::find(&mut *tx, id).await?.ok_or_else(|| not_found(id))?;
        let removed = state
            .media
            .delete_prefix(&chapter_prefix(chapter.manga_id, id))
            .await?;
        chapters::delete(&mut tx, id).await?;
        Ok::<_, ApiError>(removed)
    }
    .await;

    let removed = match deleted {
        Ok(removed) => removed,
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            }
            return Err(e);
        }
    };
    tx.commit().await?;

    info!("Chapter {} deleted ({} object(s) removed)", id, removed);
    Ok(Json(ActionResponse::ok("Chapter deleted.")))
}

pub fn chapter_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/mangas/:id/chapters",
            get(list_chapters)
                .post(create_chapter)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/chapters/:id",
            put(update_chapter)
                .delete(delete_chapter)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}
