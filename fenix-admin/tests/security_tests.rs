//! Access control and request-size tests
//!
//! Everything below `/api` and `/media` needs a live admin session:
//! no session is 401, a non-admin session is 403.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use fenix_admin::db::{sessions, users};
use fenix_admin::{build_router, AppState};
use fenix_common::auth::hash_session_token;
use fenix_common::db::init_memory_database;
use fenix_common::MediaStore;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt;

/// Test helper: router plus its database
async fn setup_app() -> (Router, SqlitePool) {
    let db = init_memory_database().await.expect("Should open memory database");
    let state = AppState::new(
        db.clone(),
        MediaStore::in_memory(),
        Duration::from_secs(3600),
        true,
    );
    (build_router(state), db)
}

/// Test helper: user with a session token, expiring `ttl_secs` from now
async fn signed_in(db: &SqlitePool, email: &str, role: users::Role, ttl_secs: i64) -> String {
    let id = users::insert(
        db,
        &users::NewUser {
            email,
            password_hash: "not-a-bcrypt-hash",
            name: "Test User",
            role,
        },
    )
    .await
    .unwrap();

    let token = format!("token-for-{}", email);
    let expires_at = chrono::Utc::now().timestamp() + ttl_secs;
    sessions::create(db, &hash_session_token(&token), id, expires_at)
        .await
        .unwrap();
    token
}

fn request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("theme=dark; fenix_session={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

const PROTECTED: [&str; 8] = [
    "/api/users",
    "/api/authors",
    "/api/artists/all",
    "/api/genres",
    "/api/mangas",
    "/api/buildinfo",
    "/api/media/url?key=1/thumbnail.webp",
    "/media/1/thumbnail.webp",
];

#[tokio::test]
async fn test_protected_routes_require_session() {
    let (app, _db) = setup_app().await;

    for uri in PROTECTED {
        let response = app.clone().oneshot(request(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);

        let body = extract_json(response.into_body()).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let (app, db) = setup_app().await;
    let reader = signed_in(&db, "reader@fenix.test", users::Role::User, 3600).await;
    let author = signed_in(&db, "author@fenix.test", users::Role::Author, 3600).await;

    for token in [&reader, &author] {
        for uri in PROTECTED {
            let response = app.clone().oneshot(request(uri, Some(token.as_str()))).await.unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
        }
    }

    // Still signed in as far as the session endpoint is concerned
    let response = app
        .clone()
        .oneshot(request("/auth/session", Some(reader.as_str())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["admin"], false);
}

#[tokio::test]
async fn test_admin_session_is_accepted() {
    let (app, db) = setup_app().await;
    let admin = signed_in(&db, "admin@fenix.test", users::Role::Admin, 3600).await;

    let response = app
        .oneshot(request("/api/users", Some(admin.as_str())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_session_is_rejected_and_removed() {
    let (app, db) = setup_app().await;
    let token = signed_in(&db, "old@fenix.test", users::Role::Admin, -60).await;

    let response = app
        .oneshot(request("/api/users", Some(token.as_str())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let (app, _db) = setup_app().await;
    let response = app
        .oneshot(request("/api/mangas", Some("forged-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_routes_need_no_session() {
    let (app, _db) = setup_app().await;

    let response = app.clone().oneshot(request("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(request("/auth/session", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_secure_cookie() {
    let (app, db) = setup_app().await;
    let token = signed_in(&db, "leaving@fenix.test", users::Role::User, 3600).await;

    let request = Request::builder()
        .method("POST")
        .uri("/auth/logout")
        .header(header::COOKIE, format!("fenix_session={}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
    assert!(cookie.contains("Secure"));

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_upload_body_limit() {
    let (app, db) = setup_app().await;
    let admin = signed_in(&db, "admin@fenix.test", users::Role::Admin, 3600).await;

    // 13 MiB file part against the 12 MiB cover limit
    let boundary = "limit-boundary";
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"thumbnail\"; filename=\"big.webp\"\r\nContent-Type: image/webp\r\n\r\n",
        b = boundary
    )
    .into_bytes();
    body.extend(std::iter::repeat(0u8).take(13 * 1024 * 1024));
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri("/api/mangas")
        .header(header::COOKIE, format!("fenix_session={}", admin))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
