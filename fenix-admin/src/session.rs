//! Login sessions and the admin gate
//!
//! A session is a random token handed to the browser in an HttpOnly
//! cookie. The database stores only its SHA-256, so a leaked database does
//! not leak usable sessions.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use fenix_common::auth::{generate_session_token, hash_session_token};
use fenix_common::db::User;
use serde::Serialize;
use tracing::{debug, warn};

use crate::db::sessions;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "fenix_session";

/// Signed-in user as seen by handlers
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(rename = "admin")]
    pub is_admin: bool,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            is_admin: user.is_admin,
        }
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Session token from the `Cookie` header(s)
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying a new session token
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> ApiResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| ApiError::Internal(format!("Invalid cookie: {}", e)))
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_cookie(secure: bool) -> HeaderValue {
    let cookie = if secure {
        "fenix_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure"
    } else {
        "fenix_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
    };
    HeaderValue::from_static(cookie)
}

/// Start a session for `user_id`, returning the `Set-Cookie` header value
pub async fn open_session(state: &AppState, user_id: i64) -> ApiResult<HeaderValue> {
    let token = generate_session_token();
    let ttl = state.session_ttl.as_secs();
    let expires_at = now_unix() + ttl as i64;

    sessions::create(&state.db, &hash_session_token(&token), user_id, expires_at).await?;

    let purged = sessions::purge_expired(&state.db, now_unix()).await?;
    if purged > 0 {
        debug!("Purged {} expired session(s)", purged);
    }

    session_cookie(&token, ttl, state.secure_cookies)
}

/// End the session named by the request cookie (if any)
pub async fn close_session(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    if let Some(token) = token_from_headers(headers) {
        sessions::delete(&state.db, &hash_session_token(&token)).await?;
    }
    Ok(())
}

/// User behind the request cookie, `None` when absent, unknown or expired
///
/// An expired session row is deleted on sight.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> ApiResult<Option<CurrentUser>> {
    let Some(token) = token_from_headers(headers) else {
        return Ok(None);
    };
    let token_hash = hash_session_token(&token);

    match sessions::find_user(&state.db, &token_hash, now_unix()).await? {
        Some(user) => Ok(Some(user.into())),
        None => {
            sessions::delete(&state.db, &token_hash).await?;
            Ok(None)
        }
    }
}

/// Middleware for admin-only routes
///
/// No valid session: 401. Signed in without admin rights: 403. On success
/// the [`CurrentUser`] is available to handlers as an extension.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = current_user(&state, request.headers())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Please sign in.".to_string()))?;

    if !user.is_admin {
        warn!(
            "User {} ({}) denied access to {}",
            user.id,
            user.email,
            request.uri().path()
        );
        return Err(ApiError::Forbidden(
            "Administrator access required.".to_string(),
        ));
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
