//! Authors, artists and genres (admin)
//!
//! The three kinds share handlers; [`catalog_routes`] mounts one set of
//! routes per [`CatalogKind`] under `/api/{authors,artists,genres}`.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Router,
};
use fenix_common::db::CatalogEntry;
use serde::Deserialize;
use tracing::info;

use super::ActionResponse;
use crate::db::catalog::{self, CatalogKind};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::forms::Validator;
use crate::pagination::{calculate_pagination, ListQuery, Paginated, PAGE_SIZE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CatalogForm {
    pub name: Option<String>,
}

fn validate(form: &CatalogForm) -> ApiResult<String> {
    let mut v = Validator::new();
    let name = v.name("name", form.name.as_deref());
    v.finish()?;
    name.ok_or_else(|| ApiError::Internal("validated name missing".to_string()))
}

fn not_found(kind: CatalogKind, id: i64) -> ApiError {
    ApiError::NotFound(format!("{} {} not found", kind.label(), id))
}

/// GET /api/{kind}?page=&query=
pub async fn list_entries(
    kind: CatalogKind,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<CatalogEntry>>> {
    let search = query.search();
    let total = catalog::count(&state.db, kind, search).await?;
    let pagination = calculate_pagination(total, query.page());
    let items = catalog::list_page(&state.db, kind, search, pagination.offset, PAGE_SIZE).await?;

    Ok(Json(Paginated::new(items, total, pagination)))
}

/// GET /api/{kind}/all
pub async fn list_all_entries(
    kind: CatalogKind,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CatalogEntry>>> {
    Ok(Json(catalog::list_all(&state.db, kind).await?))
}

/// POST /api/{kind}
pub async fn create_entry(
    kind: CatalogKind,
    State(state): State<AppState>,
    Json(form): Json<CatalogForm>,
) -> ApiResult<(StatusCode, Json<CatalogEntry>)> {
    let name = validate(&form)?;
    let entry = catalog::insert(&state.db, kind, &name).await?;
    info!("Created {} {} ({})", kind.label(), entry.id, entry.name);
    Ok((StatusCode::CREATED, Json(entry)))
}

/// PUT /api/{kind}/:id
pub async fn update_entry(
    kind: CatalogKind,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<CatalogForm>,
) -> ApiResult<Json<CatalogEntry>> {
    let name = validate(&form)?;
    catalog::update(&state.db, kind, id, &name)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(kind, id))
}

/// DELETE /api/{kind}/:id
pub async fn delete_entry(
    kind: CatalogKind,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ActionResponse>> {
    if !catalog::delete(&state.db, kind, id).await? {
        return Err(not_found(kind, id));
    }
    info!("Deleted {} {}", kind.label(), id);
    Ok(Json(ActionResponse::ok(format!("{} deleted.", kind.label()))))
}

/// Routes for one catalog kind
fn kind_routes(kind: CatalogKind) -> Router<AppState> {
    let base = format!("/api/{}", kind.table());

    Router::new()
        .route(
            &base,
            get(move |state: State<AppState>, query: Query<ListQuery>| {
                list_entries(kind, state, query)
            })
            .post(move |state: State<AppState>, form: Json<CatalogForm>| {
                create_entry(kind, state, form)
            }),
        )
        .route(
            &format!("{}/all", base),
            get(move |state: State<AppState>| list_all_entries(kind, state)),
        )
        .route(
            &format!("{}/:id", base),
            put(
                move |state: State<AppState>, id: Path<i64>, form: Json<CatalogForm>| {
                    update_entry(kind, state, id, form)
                },
            )
            .delete(move |state: State<AppState>, id: Path<i64>| delete_entry(kind, state, id)),
        )
}

/// Routes for authors, artists and genres
pub fn catalog_routes() -> Router<AppState> {
    CatalogKind::ALL
        .into_iter()
        .fold(Router::new(), |router, kind| router.merge(kind_routes(kind)))
}
