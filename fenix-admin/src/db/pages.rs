//! Chapter page images

use fenix_common::db::Page;
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Transaction};

/// Page together with the manga that owns its chapter
#[derive(Debug, Clone, FromRow)]
pub struct LocatedPage {
    #[sqlx(flatten)]
    pub page: Page,
    pub manga_id: i64,
}

/// Pages of a chapter in reading order
pub async fn list_for_chapter(pool: &SqlitePool, chapter_id: i64) -> sqlx::Result<Vec<Page>> {
    sqlx::query_as::<_, Page>(
        "SELECT id, chapter_id, number, url FROM chapter_pages WHERE chapter_id = ? ORDER BY number ASC",
    )
    .bind(chapter_id)
    .fetch_all(pool)
    .await
}

pub async fn find<'e, E>(executor: E, id: i64) -> sqlx::Result<Option<LocatedPage>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, LocatedPage>(
        r#"
        SELECT p.id, p.chapter_id, p.number, p.url, c.manga_id
        FROM chapter_pages p
        JOIN chapters c ON c.id = p.chapter_id
        WHERE p.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Whether another page of the chapter already uses `number`
pub async fn number_taken(
    tx: &mut Transaction<'_, Sqlite>,
    chapter_id: i64,
    number: i64,
    exclude_id: i64,
) -> sqlx::Result<bool> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM chapter_pages WHERE chapter_id = ? AND number = ? AND id <> ?)",
    )
    .bind(chapter_id)
    .bind(number)
    .bind(exclude_id)
    .fetch_one(&mut **tx)
    .await
}

/// Insert or replace the page at `number`
///
/// Returns the object key the row pointed at before, if any.
pub async fn upsert(
    tx: &mut Transaction<'_, Sqlite>,
    chapter_id: i64,
    number: i64,
    url: &str,
) -> sqlx::Result<Option<String>> {
    let previous: Option<String> =
        sqlx::query_scalar("SELECT url FROM chapter_pages WHERE chapter_id = ? AND number = ?")
            .bind(chapter_id)
            .bind(number)
            .fetch_optional(&mut **tx)
            .await?;

    sqlx::query(
        r#"
        INSERT INTO chapter_pages (chapter_id, number, url) VALUES (?, ?, ?)
        ON CONFLICT(chapter_id, number) DO UPDATE SET url = excluded.url
        "#,
    )
    .bind(chapter_id)
    .bind(number)
    .bind(url)
    .execute(&mut **tx)
    .await?;

    Ok(previous)
}

pub async fn update(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    number: i64,
    url: &str,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE chapter_pages SET number = ?, url = ? WHERE id = ?")
        .bind(number)
        .bind(url)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn delete(tx: &mut Transaction<'_, Sqlite>, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM chapter_pages WHERE id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fenix_common::db::init_memory_database;

    async fn seed_chapter(pool: &SqlitePool) -> i64 {
        sqlx::query("INSERT INTO mangas (id, title, slug, year) VALUES (3, 'Monster', 'monster', 1994)")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO chapters (manga_id, number) VALUES (3, 1)")
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_upsert_reports_replaced_key() {
        let pool = init_memory_database().await.unwrap();
        let chapter = seed_chapter(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        assert_eq!(upsert(&mut tx, chapter, 1, "3/chapters/1/1.png").await.unwrap(), None);
        assert_eq!(
            upsert(&mut tx, chapter, 1, "3/chapters/1/1.webp").await.unwrap(),
            Some("3/chapters/1/1.png".to_string())
        );
        tx.commit().await.unwrap();

        let pages = list_for_chapter(&pool, chapter).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "3/chapters/1/1.webp");

        let located = find(&pool, pages[0].id).await.unwrap().unwrap();
        assert_eq!(located.manga_id, 3);
        assert_eq!(located.page, pages[0]);
    }

    #[tokio::test]
    async fn test_pages_listed_in_number_order() {
        let pool = init_memory_database().await.unwrap();
        let chapter = seed_chapter(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        for n in [3, 1, 2] {
            upsert(&mut tx, chapter, n, &format!("3/chapters/{}/{}.webp", chapter, n))
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        let numbers: Vec<i64> = list_for_chapter(&pool, chapter)
            .await
            .unwrap()
            .iter()
            .map(|p| p.number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
