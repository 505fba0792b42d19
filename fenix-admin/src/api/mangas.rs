//! Manga titles (admin)
//!
//! Create and update arrive as multipart forms because they carry the
//! cover image. Row, links and cover are written under one transaction;
//! a cover uploaded for a create that fails afterwards is removed again.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::get,
    Extension, Router,
};
use fenix_common::db::Manga;
use fenix_common::storage::{manga_prefix, manga_thumbnail_key};
use serde::Serialize;
use sqlx::{Sqlite, Transaction};
use tracing::{info, warn};

use super::{object_url, ActionResponse, UPLOAD_BODY_LIMIT};
use crate::db::catalog::{self, CatalogKind};
use crate::db::mangas::{self, MangaFields};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::forms::{checkbox, MultipartForm, UploadedFile, Validator};
use crate::pagination::{calculate_pagination, ListQuery, Paginated, PAGE_SIZE};
use crate::session::CurrentUser;
use crate::AppState;

/// Manga with a browser-usable cover URL
#[derive(Debug, Serialize)]
pub struct MangaView {
    #[serde(flatten)]
    pub manga: Manga,
    pub thumbnail_url: String,
}

impl MangaView {
    async fn build(state: &AppState, manga: Manga) -> ApiResult<Self> {
        let thumbnail_url = object_url(state, &manga.thumbnail).await?;
        Ok(Self {
            manga,
            thumbnail_url,
        })
    }
}

/// Validated manga form
struct MangaForm {
    fields: MangaFields,
    /// Linked ids per catalog kind, in [`CatalogKind::ALL`] order
    links: Vec<(CatalogKind, Vec<i64>)>,
    thumbnail: Option<UploadedFile>,
}

async fn validate(
    state: &AppState,
    mut form: MultipartForm,
    thumbnail_required: bool,
) -> ApiResult<MangaForm> {
    let mut v = Validator::new();

    let title = v.name("title", form.text("title"));
    let year = v.positive_int("year", form.text("year"));
    let synopsis = form
        .text("synopsis")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let mut links = Vec::new();
    for kind in CatalogKind::ALL {
        let field = kind.table();
        if let Some(ids) = v.id_list(field, form.text(field)) {
            let missing = catalog::missing_ids(&state.db, kind, &ids).await?;
            if missing.is_empty() {
                links.push((kind, ids));
            } else {
                let missing: Vec<String> = missing.iter().map(i64::to_string).collect();
                v.add(
                    field,
                    format!("Unknown {} id(s): {}", kind.label().to_lowercase(), missing.join(", ")),
                );
            }
        }
    }

    let adult = checkbox(form.text("adult"));
    let finished = checkbox(form.text("finished"));
    let thumbnail = v.cover("thumbnail", form.take_file("thumbnail"), thumbnail_required);

    v.finish()?;
    let (Some(title), Some(year)) = (title, year) else {
        return Err(ApiError::Internal("validated fields missing".to_string()));
    };

    Ok(MangaForm {
        fields: MangaFields {
            title,
            year,
            synopsis,
            adult,
            finished,
        },
        links,
        thumbnail,
    })
}

async fn write_links(
    tx: &mut Transaction<'_, Sqlite>,
    manga_id: i64,
    links: &[(CatalogKind, Vec<i64>)],
) -> ApiResult<()> {
    for (kind, ids) in links {
        mangas::replace_links(tx, *kind, manga_id, ids).await?;
    }
    Ok(())
}

async fn upload_cover(
    tx: &mut Transaction<'_, Sqlite>,
    state: &AppState,
    manga_id: i64,
    cover: UploadedFile,
) -> ApiResult<String> {
    let key = manga_thumbnail_key(manga_id);
    state.media.put(&key, cover.bytes, "image/webp").await?;
    mangas::set_thumbnail(tx, manga_id, &key).await?;
    Ok(key)
}

/// GET /api/mangas?page=&query=
pub async fn list_mangas(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<MangaView>>> {
    let search = query.search();
    let total = mangas::count(&state.db, search).await?;
    let pagination = calculate_pagination(total, query.page());
    let rows = mangas::list_page(&state.db, search, pagination.offset, PAGE_SIZE).await?;

    let mut items = Vec::with_capacity(rows.len());
    for manga in rows {
        items.push(MangaView::build(&state, manga).await?);
    }
    Ok(Json(Paginated::new(items, total, pagination)))
}

/// GET /api/mangas/:id
pub async fn get_manga(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<MangaView>> {
    let manga = mangas::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Manga {} not found", id)))?;
    Ok(Json(MangaView::build(&state, manga).await?))
}

/// GET /api/mangas/by-slug/:slug
pub async fn get_manga_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<MangaView>> {
    let manga = mangas::find_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Manga '{}' not found", slug)))?;
    Ok(Json(MangaView::build(&state, manga).await?))
}

/// POST /api/mangas (multipart)
pub async fn create_manga(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<MangaView>)> {
    let form = MultipartForm::read(multipart).await?;
    let MangaForm {
        fields,
        links,
        thumbnail,
    } = validate(&state, form, true).await?;
    let cover = thumbnail.ok_or_else(|| ApiError::field("thumbnail", "An image is required."))?;

    let mut uploaded = Vec::new();
    let mut tx = state.db.begin().await?;

    let created = async {
        let slug = mangas::unique_slug(&mut tx, &fields.title).await?;
        let id = mangas::insert(&mut tx, &fields, &slug, user.id).await?;
        write_links(&mut tx, id, &links).await?;
        uploaded.push(upload_cover(&mut tx, &state, id, cover).await?);
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

    info!("Manga {} created by user {}", id, user.id);
    let manga = mangas::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("manga {} vanished after commit", id)))?;
    Ok((StatusCode::CREATED, Json(MangaView::build(&state, manga).await?)))
}

/// PUT /api/mangas/:id (multipart)
///
/// The slug is fixed at creation. The cover is replaced only when a new
/// file is sent.
pub async fn update_manga(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<Json<MangaView>> {
    let form = MultipartForm::read(multipart).await?;
    let MangaForm {
        fields,
        links,
        thumbnail,
    } = validate(&state, form, false).await?;

    let mut tx = state.db.begin().await?;
    let updated = async {
        if !mangas::update(&mut tx, id, &fields).await? {
            return Err(ApiError::NotFound(format!("Manga {} not found", id)));
        }
        write_links(&mut tx, id, &links).await?;
        if let Some(cover) = thumbnail {
            upload_cover(&mut tx, &state, id, cover).await?;
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

    info!("Manga {} updated", id);
    let manga = mangas::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Manga {} not found", id)))?;
    Ok(Json(MangaView::build(&state, manga).await?))
}

/// DELETE /api/mangas/:id
///
/// Chapters, pages and links go with the row; stored images are removed
/// afterwards on a best-effort basis.
pub async fn delete_manga(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ActionResponse>> {
    if !mangas::delete(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Manga {} not found", id)));
    }

    match state.media.delete_prefix(&manga_prefix(id)).await {
        Ok(removed) => info!("Manga {} deleted ({} object(s) removed)", id, removed),
        Err(e) => warn!("Manga {} deleted but its images could not be removed: {}", id, e),
    }

    Ok(Json(ActionResponse::ok("Manga deleted.")))
}

pub fn manga_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/mangas",
            get(list_mangas).post(create_manga).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/mangas/:id",
            get(get_manga)
                .put(update_manga)
                .delete(delete_manga)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/mangas/by-slug/:slug", get(get_manga_by_slug))
}
