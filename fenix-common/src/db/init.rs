//! Database initialization
//!
//! Opens (creating if needed) the SQLite database and brings the schema
//! up to date. Every statement is idempotent; running initialization
//! against an existing database is a no-op apart from the connection.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 2;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;
    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// The pool holds exactly one connection that never expires: every
/// connection to `sqlite::memory:` is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Memory);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Case-folded form of `text` used for searching
///
/// SQLite's `LIKE` and `lower()` only fold ASCII, so searchable text is
/// stored a second time folded with Rust's Unicode rules and compared
/// against a pattern folded the same way.
///
/// # Examples
/// ```
/// use fenix_common::db::fold_case;
///
/// assert_eq!(fold_case("AÇÃO"), "ação");
/// ```
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Tables with a folded copy of a searchable column: (table, source, folded)
const FOLDED_COLUMNS: [(&str, &str, &str); 5] = [
    ("authors", "name", "name_folded"),
    ("artists", "name", "name_folded"),
    ("genres", "name", "name_folded"),
    ("mangas", "title", "title_folded"),
    ("chapters", "title", "title_folded"),
];

/// Create all tables and indexes
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    create_catalog_tables(pool).await?;
    create_mangas_table(pool).await?;
    create_manga_link_tables(pool).await?;
    create_chapters_table(pool).await?;
    create_chapter_pages_table(pool).await?;
    add_folded_columns(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            avatar_url TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            is_author INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Authors, artists and genres share one shape
async fn create_catalog_tables(pool: &SqlitePool) -> Result<()> {
    for table in ["authors", "artists", "genres"] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                name_folded TEXT NOT NULL DEFAULT '',
                slug TEXT
            )
            "#
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_name ON {table}(name)"
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn create_mangas_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mangas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            title_folded TEXT NOT NULL DEFAULT '',
            slug TEXT NOT NULL UNIQUE,
            views INTEGER NOT NULL DEFAULT 0,
            synopsis TEXT,
            year INTEGER NOT NULL,
            thumbnail TEXT NOT NULL DEFAULT '',
            adult INTEGER NOT NULL DEFAULT 0,
            finished INTEGER NOT NULL DEFAULT 0,
            created_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_manga_link_tables(pool: &SqlitePool) -> Result<()> {
    for (table, column, target) in [
        ("manga_authors", "author_id", "authors"),
        ("manga_artists", "artist_id", "artists"),
        ("manga_genres", "genre_id", "genres"),
    ] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                manga_id INTEGER NOT NULL REFERENCES mangas(id) ON DELETE CASCADE,
                {column} INTEGER NOT NULL REFERENCES {target}(id) ON DELETE CASCADE,
                PRIMARY KEY (manga_id, {column})
            )
            "#
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn create_chapters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            manga_id INTEGER NOT NULL REFERENCES mangas(id) ON DELETE CASCADE,
            number REAL NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            title_folded TEXT NOT NULL DEFAULT '',
            thumbnail TEXT NOT NULL DEFAULT '',
            created_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (manga_id, number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_chapter_pages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapter_pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chapter_id INTEGER NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
            number INTEGER NOT NULL,
            url TEXT NOT NULL,
            UNIQUE (chapter_id, number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Add folded search columns to databases created before they existed,
/// and fill any that are still empty
async fn add_folded_columns(pool: &SqlitePool) -> Result<()> {
    for (table, source, folded) in FOLDED_COLUMNS {
        let present: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?) WHERE name = ?)",
        )
        .bind(table)
        .bind(folded)
        .fetch_one(pool)
        .await?;

        if !present {
            info!("Adding {}.{}", table, folded);
            sqlx::query(&format!(
                "ALTER TABLE {table} ADD COLUMN {folded} TEXT NOT NULL DEFAULT ''"
            ))
            .execute(pool)
            .await?;
        }

        let stale: Vec<(i64, String)> = sqlx::query_as(&format!(
            "SELECT id, {source} FROM {table} WHERE {folded} = '' AND {source} <> ''"
        ))
        .fetch_all(pool)
        .await?;

        for (id, text) in &stale {
            sqlx::query(&format!("UPDATE {table} SET {folded} = ? WHERE id = ?"))
                .bind(fold_case(text))
                .bind(id)
                .execute(pool)
                .await?;
        }
        if !stale.is_empty() {
            info!("Filled {}.{} for {} row(s)", table, folded, stale.len());
        }
    }

    Ok(())
}
