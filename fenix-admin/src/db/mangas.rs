//! Manga titles and their author/artist/genre links

use super::catalog::CatalogKind;
use super::search_pattern;
use chrono::NaiveDateTime;
use fenix_common::db::{fold_case, parse_id_csv, Manga};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Transaction};

/// Editable manga columns
#[derive(Debug, Clone)]
pub struct MangaFields {
    pub title: String,
    pub year: i64,
    pub synopsis: Option<String>,
    pub adult: bool,
    pub finished: bool,
}

#[derive(Debug, FromRow)]
struct MangaRow {
    id: i64,
    title: String,
    slug: String,
    views: i64,
    synopsis: Option<String>,
    year: i64,
    thumbnail: String,
    adult: bool,
    finished: bool,
    created_by: Option<i64>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    author_ids: Option<String>,
    artist_ids: Option<String>,
    genre_ids: Option<String>,
}

impl From<MangaRow> for Manga {
    fn from(row: MangaRow) -> Self {
        Manga {
            id: row.id,
            title: row.title,
            slug: row.slug,
            views: row.views,
            synopsis: row.synopsis,
            year: row.year,
            thumbnail: row.thumbnail,
            adult: row.adult,
            finished: row.finished,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            author_ids: parse_id_csv(row.author_ids.as_deref()),
            artist_ids: parse_id_csv(row.artist_ids.as_deref()),
            genre_ids: parse_id_csv(row.genre_ids.as_deref()),
        }
    }
}

const SELECT_MANGA: &str = r#"
    SELECT m.id, m.title, m.slug, m.views, m.synopsis, m.year, m.thumbnail,
           m.adult, m.finished, m.created_by, m.created_at, m.updated_at,
           (SELECT GROUP_CONCAT(author_id) FROM manga_authors WHERE manga_id = m.id) AS author_ids,
           (SELECT GROUP_CONCAT(artist_id) FROM manga_artists WHERE manga_id = m.id) AS artist_ids,
           (SELECT GROUP_CONCAT(genre_id) FROM manga_genres WHERE manga_id = m.id) AS genre_ids
    FROM mangas m
"#;

pub async fn count(pool: &SqlitePool, search: Option<&str>) -> sqlx::Result<i64> {
    let pattern = search.map(search_pattern);
    sqlx::query_scalar("SELECT COUNT(*) FROM mangas WHERE (? IS NULL OR title_folded LIKE ? ESCAPE '\\')")
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(pool)
        .await
}

/// One page of mangas ordered by title
pub async fn list_page(
    pool: &SqlitePool,
    search: Option<&str>,
    offset: i64,
    limit: i64,
) -> sqlx::Result<Vec<Manga>> {
    let pattern = search.map(search_pattern);
    let rows = sqlx::query_as::<_, MangaRow>(&format!(
        r#"{SELECT_MANGA}
        WHERE (? IS NULL OR m.title_folded LIKE ? ESCAPE '\')
        ORDER BY m.title COLLATE NOCASE, m.id
        LIMIT ? OFFSET ?"#
    ))
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Manga::from).collect())
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> sqlx::Result<Option<Manga>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, MangaRow>(&format!("{SELECT_MANGA} WHERE m.id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(Manga::from))
}

pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> sqlx::Result<Option<Manga>> {
    let row = sqlx::query_as::<_, MangaRow>(&format!("{SELECT_MANGA} WHERE m.slug = ?"))
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Manga::from))
}

/// Title of a manga, `None` when it does not exist
pub async fn title_of(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<String>> {
    sqlx::query_scalar("SELECT title FROM mangas WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// First free slug among `base`, `base-2`, `base-3`, ...
pub async fn unique_slug(tx: &mut Transaction<'_, Sqlite>, title: &str) -> sqlx::Result<String> {
    let base = Some(slug::slugify(title))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "manga".to_string());

    let mut candidate = base.clone();
    let mut suffix = 2;
    loop {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM mangas WHERE slug = ?)")
            .bind(&candidate)
            .fetch_one(&mut **tx)
            .await?;
        if !taken {
            return Ok(candidate);
        }
        candidate = format!("{}-{}", base, suffix);
        suffix += 1;
    }
}

/// Insert a manga with an empty thumbnail key, returning its id
pub async fn insert(
    tx: &mut Transaction<'_, Sqlite>,
    fields: &MangaFields,
    slug: &str,
    created_by: i64,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO mangas (title, title_folded, slug, views, synopsis, year, thumbnail, adult, finished, created_by)
        VALUES (?, ?, ?, 0, ?, ?, '', ?, ?, ?)
        "#,
    )
    .bind(&fields.title)
    .bind(fold_case(&fields.title))
    .bind(slug)
    .bind(&fields.synopsis)
    .bind(fields.year)
    .bind(fields.adult)
    .bind(fields.finished)
    .bind(created_by)
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Update editable columns (slug is kept); false when the manga is gone
pub async fn update(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    fields: &MangaFields,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE mangas
        SET title = ?, title_folded = ?, synopsis = ?, year = ?, adult = ?, finished = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&fields.title)
    .bind(fold_case(&fields.title))
    .bind(&fields.synopsis)
    .bind(fields.year)
    .bind(fields.adult)
    .bind(fields.finished)
    .bind(id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_thumbnail(tx: &mut Transaction<'_, Sqlite>, id: i64, key: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE mangas SET thumbnail = ? WHERE id = ?")
        .bind(key)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Replace every link of one kind
pub async fn replace_links(
    tx: &mut Transaction<'_, Sqlite>,
    kind: CatalogKind,
    manga_id: i64,
    ids: &[i64],
) -> sqlx::Result<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE manga_id = ?", kind.link_table()))
        .bind(manga_id)
        .execute(&mut **tx)
        .await?;

    let insert = format!(
        "INSERT INTO {} (manga_id, {}) VALUES (?, ?)",
        kind.link_table(),
        kind.link_column()
    );
    for id in ids {
        sqlx::query(&insert)
            .bind(manga_id)
            .bind(id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

/// Delete a manga; chapters, pages and links cascade
pub async fn delete(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM mangas WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog;
    use fenix_common::db::init_memory_database;

    fn fields(title: &str) -> MangaFields {
        MangaFields {
            title: title.to_string(),
            year: 1997,
            synopsis: None,
            adult: false,
            finished: false,
        }
    }

    async fn seed_user(pool: &SqlitePool) -> i64 {
        sqlx::query("INSERT INTO users (email, password_hash, name) VALUES ('a@fenix.dev', 'x', 'Admin')")
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_slugs_are_made_unique() {
        let pool = init_memory_database().await.unwrap();
        let user = seed_user(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        let first = unique_slug(&mut tx, "One Piece").await.unwrap();
        insert(&mut tx, &fields("One Piece"), &first, user).await.unwrap();
        let second = unique_slug(&mut tx, "One  Piece!").await.unwrap();
        insert(&mut tx, &fields("One  Piece!"), &second, user).await.unwrap();
        let third = unique_slug(&mut tx, "one piece").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, "one-piece");
        assert_eq!(second, "one-piece-2");
        assert_eq!(third, "one-piece-3");
    }

    #[tokio::test]
    async fn test_links_round_trip_through_group_concat() {
        let pool = init_memory_database().await.unwrap();
        let user = seed_user(&pool).await;
        let a1 = catalog::insert(&pool, CatalogKind::Author, "Author One").await.unwrap();
        let a2 = catalog::insert(&pool, CatalogKind::Author, "Author Two").await.unwrap();
        let g = catalog::insert(&pool, CatalogKind::Genre, "Adventure").await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let id = insert(&mut tx, &fields("Berserk"), "berserk", user).await.unwrap();
        replace_links(&mut tx, CatalogKind::Author, id, &[a1.id, a2.id]).await.unwrap();
        replace_links(&mut tx, CatalogKind::Genre, id, &[g.id]).await.unwrap();
        tx.commit().await.unwrap();

        let manga = find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(manga.author_ids, vec![a1.id, a2.id]);
        assert!(manga.artist_ids.is_empty());
        assert_eq!(manga.genre_ids, vec![g.id]);
        assert_eq!(manga.views, 0);
        assert_eq!(manga.created_by, Some(user));

        let mut tx = pool.begin().await.unwrap();
        replace_links(&mut tx, CatalogKind::Author, id, &[a2.id]).await.unwrap();
        tx.commit().await.unwrap();

        let manga = find_by_slug(&pool, "berserk").await.unwrap().unwrap();
        assert_eq!(manga.author_ids, vec![a2.id]);
    }
}
