//! User accounts

use fenix_common::db::User;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Avatar assigned to new accounts
pub const DEFAULT_AVATAR: &str = "default.webp";

/// Account role as exposed to the admin panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Author,
    Admin,
}

impl Role {
    /// Role stored in the `is_admin` / `is_author` flags
    pub fn of(user: &User) -> Self {
        if user.is_admin {
            Role::Admin
        } else if user.is_author {
            Role::Author
        } else {
            Role::User
        }
    }

    /// `(is_admin, is_author)`
    pub fn flags(self) -> (bool, bool) {
        match self {
            Role::User => (false, false),
            Role::Author => (false, true),
            Role::Admin => (true, true),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "author" => Ok(Role::Author),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Values for a new account
#[derive(Debug)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
    pub role: Role,
}

const USER_COLUMNS: &str =
    "id, email, password_hash, name, avatar_url, is_admin, is_author, created_at";

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Look up by e-mail (stored lowercase)
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email.trim().to_ascii_lowercase())
        .fetch_optional(pool)
        .await
}

pub async fn count(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
}

/// Newest accounts first
pub async fn list_page(pool: &SqlitePool, offset: i64, limit: i64) -> sqlx::Result<Vec<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Insert an account; a duplicate e-mail surfaces as a unique violation
pub async fn insert(pool: &SqlitePool, user: &NewUser<'_>) -> sqlx::Result<i64> {
    let (is_admin, is_author) = user.role.flags();
    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, name, avatar_url, is_admin, is_author)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.name)
    .bind(DEFAULT_AVATAR)
    .bind(is_admin)
    .bind(is_author)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Update profile fields; the password hash only changes when given
///
/// Returns false when the user does not exist.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    name: &str,
    email: &str,
    role: Role,
    password_hash: Option<&str>,
) -> sqlx::Result<bool> {
    let (is_admin, is_author) = role.flags();
    let result = sqlx::query(
        r#"
        UPDATE users
        SET name = ?, email = ?, is_admin = ?, is_author = ?,
            password_hash = COALESCE(?, password_hash)
        WHERE id = ?
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(is_admin)
    .bind(is_author)
    .bind(password_hash)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Grant admin rights and replace the password (operator bootstrap)
pub async fn promote_to_admin(
    pool: &SqlitePool,
    id: i64,
    name: &str,
    password_hash: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE users SET is_admin = 1, is_author = 1, name = ?, password_hash = ? WHERE id = ?",
    )
    .bind(name)
    .bind(password_hash)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete an account (its sessions cascade)
pub async fn delete(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fenix_common::db::init_memory_database;

    #[test]
    fn test_role_round_trip_through_flags() {
        for role in [Role::User, Role::Author, Role::Admin] {
            let (is_admin, is_author) = role.flags();
            let user = User {
                id: 1,
                email: String::new(),
                password_hash: String::new(),
                name: String::new(),
                avatar_url: None,
                is_admin,
                is_author,
                created_at: chrono::NaiveDateTime::default(),
            };
            assert_eq!(Role::of(&user), role);
        }
        assert!("editor".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let pool = init_memory_database().await.unwrap();
        let id = insert(
            &pool,
            &NewUser {
                email: "reader@fenix.dev",
                password_hash: "x",
                name: "Reader",
                role: Role::User,
            },
        )
        .await
        .unwrap();

        let user = find_by_email(&pool, " Reader@Fenix.dev ").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.avatar_url.as_deref(), Some(DEFAULT_AVATAR));
    }

    #[tokio::test]
    async fn test_update_keeps_password_when_absent() {
        let pool = init_memory_database().await.unwrap();
        let id = insert(
            &pool,
            &NewUser {
                email: "a@fenix.dev",
                password_hash: "original",
                name: "Alpha",
                role: Role::User,
            },
        )
        .await
        .unwrap();

        assert!(update(&pool, id, "Alpha Two", "a@fenix.dev", Role::Author, None)
            .await
            .unwrap());
        let user = find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "original");
        assert_eq!(user.name, "Alpha Two");
        assert!(user.is_author);

        assert!(!update(&pool, 999, "X", "x@fenix.dev", Role::User, None).await.unwrap());
    }
}
