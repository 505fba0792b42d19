//! Server-side login sessions
//!
//! Only the SHA-256 of a session token is stored; `expires_at` is a unix
//! timestamp in seconds.

use fenix_common::db::User;
use sqlx::SqlitePool;

pub async fn create(
    pool: &SqlitePool,
    token_hash: &str,
    user_id: i64,
    expires_at: i64,
) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// User owning an unexpired session
pub async fn find_user(pool: &SqlitePool, token_hash: &str, now: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.email, u.password_hash, u.name, u.avatar_url,
               u.is_admin, u.is_author, u.created_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = ? AND s.expires_at > ?
        "#,
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &SqlitePool, token_hash: &str) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove every expired session, returning how many were removed
pub async fn purge_expired(pool: &SqlitePool, now: i64) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::{self, NewUser, Role};
    use fenix_common::db::init_memory_database;

    #[tokio::test]
    async fn test_expired_session_is_ignored_and_purged() {
        let pool = init_memory_database().await.unwrap();
        let user_id = users::insert(
            &pool,
            &NewUser {
                email: "a@fenix.dev",
                password_hash: "x",
                name: "Alpha",
                role: Role::Admin,
            },
        )
        .await
        .unwrap();

        create(&pool, "live", user_id, 2_000).await.unwrap();
        create(&pool, "stale", user_id, 1_000).await.unwrap();

        assert!(find_user(&pool, "live", 1_500).await.unwrap().is_some());
        assert!(find_user(&pool, "stale", 1_500).await.unwrap().is_none());

        assert_eq!(purge_expired(&pool, 1_500).await.unwrap(), 1);
        assert!(find_user(&pool, "live", 1_500).await.unwrap().is_some());
    }
}
