//! Sign-up, sign-in and sign-out
//!
//! These routes are public; everything under `/api` sits behind
//! [`crate::session::require_admin`].

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use fenix_common::auth::{hash_password, verify_password};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{self, users};
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::forms::Validator;
use crate::session::{self, CurrentUser};
use crate::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub user: CurrentUser,
}

/// Hash on the blocking pool; bcrypt is deliberately slow
pub(crate) async fn hash_password_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(ApiError::from)
}

async fn verify_password_blocking(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Verification task failed: {}", e)))
}

/// POST /auth/register
///
/// Creates a regular (non-admin) account and signs it in.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut v = Validator::new();
    let name = v.name("name", request.name.as_deref());
    let email = v.email("email", request.email.as_deref());
    let password = v.password("password", request.password.as_deref());
    v.finish()?;
    let (Some(name), Some(email), Some(password)) = (name, email, password) else {
        return Err(ApiError::Internal("validated fields missing".to_string()));
    };

    let password_hash = hash_password_blocking(password).await?;
    let id = users::insert(
        &state.db,
        &users::NewUser {
            email: &email,
            password_hash: &password_hash,
            name: &name,
            role: users::Role::User,
        },
    )
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            ApiError::Conflict("This e-mail is already registered.".to_string())
        } else {
            e.into()
        }
    })?;

    info!("Registered user {} ({})", id, email);
    let cookie = session::open_session(&state, id).await?;
    let user = CurrentUser {
        id,
        name,
        email,
        is_admin: false,
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse {
            success: true,
            user,
        }),
    ))
}

/// POST /auth/login
///
/// Unknown e-mail and wrong password get the same answer.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = request.email.unwrap_or_default();
    let password = request.password.unwrap_or_default();
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let Some(user) = users::find_by_email(&state.db, &email).await? else {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };
    if !verify_password_blocking(password, user.password_hash.clone()).await? {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let cookie = session::open_session(&state, user.id).await?;
    info!("User {} signed in", user.id);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse {
            success: true,
            user: user.into(),
        }),
    ))
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    session::close_session(&state, &headers).await?;

    Ok((
        [(header::SET_COOKIE, session::clear_cookie(state.secure_cookies))],
        Json(super::ActionResponse::ok("Signed out.")),
    ))
}

/// GET /auth/session
pub async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<CurrentUser>> {
    session::current_user(&state, &headers)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::Unauthorized("Not signed in.".to_string()))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(current_session))
}
