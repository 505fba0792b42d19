//! Chapters of a manga

use super::search_pattern;
use fenix_common::db::fold_case;
use fenix_common::db::Chapter;
use sqlx::{Executor, Sqlite, SqlitePool, Transaction};

const CHAPTER_COLUMNS: &str = "id, manga_id, number, title, thumbnail, created_by, created_at";

/// `query` matches the title or the number as text
const SEARCH_FILTER: &str =
    r#"(? IS NULL OR title_folded LIKE ? ESCAPE '\' OR CAST(number AS TEXT) LIKE ? ESCAPE '\')"#;

pub async fn count(pool: &SqlitePool, manga_id: i64, search: Option<&str>) -> sqlx::Result<i64> {
    let pattern = search.map(search_pattern);
    sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM chapters WHERE manga_id = ? AND {SEARCH_FILTER}"
    ))
    .bind(manga_id)
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .fetch_one(pool)
    .await
}

/// One page of a manga's chapters, highest number first
pub async fn list_page(
    pool: &SqlitePool,
    manga_id: i64,
    search: Option<&str>,
    offset: i64,
    limit: i64,
) -> sqlx::Result<Vec<Chapter>> {
    let pattern = search.map(search_pattern);
    sqlx::query_as::<_, Chapter>(&format!(
        r#"
        SELECT {CHAPTER_COLUMNS} FROM chapters
        WHERE manga_id = ? AND {SEARCH_FILTER}
        ORDER BY number DESC
        LIMIT ? OFFSET ?
        "#
    ))
    .bind(manga_id)
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn find<'e, E>(executor: E, id: i64) -> sqlx::Result<Option<Chapter>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Chapter>(&format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Whether another chapter of the manga already uses `number`
pub async fn number_taken(
    tx: &mut Transaction<'_, Sqlite>,
    manga_id: i64,
    number: f64,
    exclude_id: Option<i64>,
) -> sqlx::Result<bool> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM chapters
            WHERE manga_id = ? AND number = ? AND (? IS NULL OR id <> ?)
        )
        "#,
    )
    .bind(manga_id)
    .bind(number)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_one(&mut **tx)
    .await
}

/// Insert a chapter with an empty thumbnail key, returning its id
pub async fn insert(
    tx: &mut Transaction<'_, Sqlite>,
    manga_id: i64,
    number: f64,
    title: &str,
    created_by: i64,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO chapters (manga_id, number, title, title_folded, thumbnail, created_by) VALUES (?, ?, ?, ?, '', ?)",
    )
    .bind(manga_id)
    .bind(number)
    .bind(title)
    .bind(fold_case(title))
    .bind(created_by)
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn update(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    number: f64,
    title: &str,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE chapters SET number = ?, title = ?, title_folded = ? WHERE id = ?")
        .bind(number)
        .bind(title)
        .bind(fold_case(title))
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn set_thumbnail(tx: &mut Transaction<'_, Sqlite>, id: i64, key: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE chapters SET thumbnail = ? WHERE id = ?")
        .bind(key)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Delete a chapter; its pages cascade
pub async fn delete(tx: &mut Transaction<'_, Sqlite>, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM chapters WHERE id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}
