//! Account management (admin)

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Extension, Router,
};
use chrono::NaiveDateTime;
use fenix_common::db::User;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::hash_password_blocking;
use super::ActionResponse;
use crate::db::{self, users, users::Role};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::forms::Validator;
use crate::pagination::{calculate_pagination, ListQuery, Paginated, PAGE_SIZE};
use crate::session::CurrentUser;
use crate::AppState;

/// Account as listed in the admin panel
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: NaiveDateTime,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        let role = Role::of(&user);
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
            role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

struct ValidUser {
    name: String,
    email: String,
    password: Option<String>,
    role: Role,
}

/// Password is required on create and optional (blank = unchanged) on update
fn validate(form: UserForm, password_required: bool) -> ApiResult<ValidUser> {
    let mut v = Validator::new();
    let name = v.name("name", form.name.as_deref());
    let email = v.email("email", form.email.as_deref());

    let password = match form.password.as_deref().filter(|p| !p.is_empty()) {
        Some(p) => v.password("password", Some(p)),
        None if password_required => v.password("password", None),
        None => None,
    };

    let role = match form.role.as_deref().map(str::parse::<Role>) {
        Some(Ok(role)) => Some(role),
        Some(Err(_)) | None => {
            v.add("role", "Role must be user, author or admin.");
            None
        }
    };

    v.finish()?;
    let (Some(name), Some(email), Some(role)) = (name, email, role) else {
        return Err(ApiError::Internal("validated fields missing".to_string()));
    };

    Ok(ValidUser {
        name,
        email,
        password,
        role,
    })
}

fn duplicate_email(err: sqlx::Error) -> ApiError {
    if db::is_unique_violation(&err) {
        ApiError::Conflict("This e-mail is already registered.".to_string())
    } else {
        err.into()
    }
}

/// GET /api/users?page=
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<UserView>>> {
    let total = users::count(&state.db).await?;
    let pagination = calculate_pagination(total, query.page());
    let rows = users::list_page(&state.db, pagination.offset, PAGE_SIZE).await?;

    Ok(Json(
        Paginated::new(rows, total, pagination).map(UserView::from),
    ))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(form): Json<UserForm>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let user = validate(form, true)?;
    let password = user.password.unwrap_or_default();
    let password_hash = hash_password_blocking(password).await?;

    let id = users::insert(
        &state.db,
        &users::NewUser {
            email: &user.email,
            password_hash: &password_hash,
            name: &user.name,
            role: user.role,
        },
    )
    .await
    .map_err(duplicate_email)?;

    info!("Created user {} ({:?})", id, user.role);
    let created = users::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("user {} vanished after insert", id)))?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<UserForm>,
) -> ApiResult<Json<UserView>> {
    let user = validate(form, false)?;
    let password_hash = match user.password {
        Some(password) => Some(hash_password_blocking(password).await?),
        None => None,
    };

    let updated = users::update(
        &state.db,
        id,
        &user.name,
        &user.email,
        user.role,
        password_hash.as_deref(),
    )
    .await
    .map_err(duplicate_email)?;
    if !updated {
        return Err(ApiError::NotFound(format!("User {} not found", id)));
    }

    let user = users::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;
    Ok(Json(user.into()))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ActionResponse>> {
    if current.id == id {
        return Err(ApiError::BadRequest(
            "You cannot delete your own account.".to_string(),
        ));
    }

    if !users::delete(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("User {} not found", id)));
    }

    info!("User {} deleted by {}", id, current.id);
    Ok(Json(ActionResponse::ok("User deleted.")))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", put(update_user).delete(delete_user))
}
