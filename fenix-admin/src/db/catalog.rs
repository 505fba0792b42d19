//! Authors, artists and genres
//!
//! The three tables share one shape, so every query is parameterized by
//! [`CatalogKind`]. Table names come from the enum, never from input.

use super::search_pattern;
use fenix_common::db::fold_case;
use fenix_common::db::CatalogEntry;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Author,
    Artist,
    Genre,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 3] = [CatalogKind::Author, CatalogKind::Artist, CatalogKind::Genre];

    /// Table name, also used as the URL segment and the manga form field
    pub fn table(self) -> &'static str {
        match self {
            CatalogKind::Author => "authors",
            CatalogKind::Artist => "artists",
            CatalogKind::Genre => "genres",
        }
    }

    /// Human-readable singular name
    pub fn label(self) -> &'static str {
        match self {
            CatalogKind::Author => "Author",
            CatalogKind::Artist => "Artist",
            CatalogKind::Genre => "Genre",
        }
    }

    /// Join table linking mangas to this kind
    pub fn link_table(self) -> &'static str {
        match self {
            CatalogKind::Author => "manga_authors",
            CatalogKind::Artist => "manga_artists",
            CatalogKind::Genre => "manga_genres",
        }
    }

    /// Foreign key column in [`Self::link_table`]
    pub fn link_column(self) -> &'static str {
        match self {
            CatalogKind::Author => "author_id",
            CatalogKind::Artist => "artist_id",
            CatalogKind::Genre => "genre_id",
        }
    }
}

/// URL slug for a name; `None` when nothing sluggable remains
pub fn slug_for(name: &str) -> Option<String> {
    Some(slug::slugify(name)).filter(|s| !s.is_empty())
}

/// Number of entries whose name contains `search`
pub async fn count(pool: &SqlitePool, kind: CatalogKind, search: Option<&str>) -> sqlx::Result<i64> {
    let pattern = search.map(search_pattern);
    sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE (? IS NULL OR name_folded LIKE ? ESCAPE '\\')",
        kind.table()
    ))
    .bind(&pattern)
    .bind(&pattern)
    .fetch_one(pool)
    .await
}

/// One page of entries ordered by name
pub async fn list_page(
    pool: &SqlitePool,
    kind: CatalogKind,
    search: Option<&str>,
    offset: i64,
    limit: i64,
) -> sqlx::Result<Vec<CatalogEntry>> {
    let pattern = search.map(search_pattern);
    sqlx::query_as::<_, CatalogEntry>(&format!(
        r#"
        SELECT id, name, slug FROM {}
        WHERE (? IS NULL OR name_folded LIKE ? ESCAPE '\')
        ORDER BY name COLLATE NOCASE, id
        LIMIT ? OFFSET ?
        "#,
        kind.table()
    ))
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Every entry ordered by name (manga form options)
pub async fn list_all(pool: &SqlitePool, kind: CatalogKind) -> sqlx::Result<Vec<CatalogEntry>> {
    sqlx::query_as::<_, CatalogEntry>(&format!(
        "SELECT id, name, slug FROM {} ORDER BY name COLLATE NOCASE, id",
        kind.table()
    ))
    .fetch_all(pool)
    .await
}

pub async fn insert(pool: &SqlitePool, kind: CatalogKind, name: &str) -> sqlx::Result<CatalogEntry> {
    let slug = slug_for(name);
    let result = sqlx::query(&format!(
        "INSERT INTO {} (name, name_folded, slug) VALUES (?, ?, ?)",
        kind.table()
    ))
    .bind(name)
    .bind(fold_case(name))
    .bind(&slug)
    .execute(pool)
    .await?;

    Ok(CatalogEntry {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        slug,
    })
}

/// Rename an entry, recomputing its slug; `None` when it does not exist
pub async fn update(
    pool: &SqlitePool,
    kind: CatalogKind,
    id: i64,
    name: &str,
) -> sqlx::Result<Option<CatalogEntry>> {
    let slug = slug_for(name);
    let result = sqlx::query(&format!(
        "UPDATE {} SET name = ?, name_folded = ?, slug = ? WHERE id = ?",
        kind.table()
    ))
    .bind(name)
    .bind(fold_case(name))
    .bind(&slug)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(CatalogEntry {
        id,
        name: name.to_string(),
        slug,
    }))
}

/// Delete an entry; manga links cascade
pub async fn delete(pool: &SqlitePool, kind: CatalogKind, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", kind.table()))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Ids from `ids` that have no row in the kind's table
pub async fn missing_ids(pool: &SqlitePool, kind: CatalogKind, ids: &[i64]) -> sqlx::Result<Vec<i64>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    // JSON array literal for json_each; integers need no escaping
    let json = format!(
        "[{}]",
        ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
    );
    sqlx::query_scalar(&format!(
        r#"
        SELECT j.value FROM json_each(?) j
        WHERE NOT EXISTS (SELECT 1 FROM {} t WHERE t.id = j.value)
        ORDER BY j.value
        "#,
        kind.table()
    ))
    .bind(json)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use fenix_common::db::init_memory_database;

    #[tokio::test]
    async fn test_search_escapes_wildcards() {
        let pool = init_memory_database().await.unwrap();
        insert(&pool, CatalogKind::Genre, "100% Action").await.unwrap();
        insert(&pool, CatalogKind::Genre, "1000 Actions").await.unwrap();

        assert_eq!(count(&pool, CatalogKind::Genre, Some("100%")).await.unwrap(), 1);
        assert_eq!(count(&pool, CatalogKind::Genre, Some("action")).await.unwrap(), 2);
        assert_eq!(count(&pool, CatalogKind::Genre, None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_recomputes_slug() {
        let pool = init_memory_database().await.unwrap();
        let entry = insert(&pool, CatalogKind::Author, "Eiichiro Oda").await.unwrap();
        assert_eq!(entry.slug.as_deref(), Some("eiichiro-oda"));

        let updated = update(&pool, CatalogKind::Author, entry.id, "Akira Toriyama")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.slug.as_deref(), Some("akira-toriyama"));

        assert!(update(&pool, CatalogKind::Author, 999, "Nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_ids() {
        let pool = init_memory_database().await.unwrap();
        let a = insert(&pool, CatalogKind::Artist, "Artist A").await.unwrap();

        let missing = missing_ids(&pool, CatalogKind::Artist, &[a.id, 42, 7]).await.unwrap();
        assert_eq!(missing, vec![7, 42]);

        let none = missing_ids(&pool, CatalogKind::Artist, &[a.id]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_search_folds_accented_capitals() {
        let pool = init_memory_database().await.unwrap();
        let entry = insert(&pool, CatalogKind::Genre, "Ação").await.unwrap();
        insert(&pool, CatalogKind::Genre, "Comédia").await.unwrap();

        for query in ["ação", "AÇÃO", "Açã"] {
            assert_eq!(count(&pool, CatalogKind::Genre, Some(query)).await.unwrap(), 1, "{}", query);
        }
        assert_eq!(count(&pool, CatalogKind::Genre, Some("COMÉDIA")).await.unwrap(), 1);

        // Renaming refreshes the folded copy
        update(&pool, CatalogKind::Genre, entry.id, "Ficção").await.unwrap();
        assert_eq!(count(&pool, CatalogKind::Genre, Some("AÇÃO")).await.unwrap(), 0);
        let found = list_page(&pool, CatalogKind::Genre, Some("FICÇÃO"), 0, 20).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Ficção");
    }

    #[tokio::test]
    async fn test_list_orders_by_name_case_insensitively() {
        let pool = init_memory_database().await.unwrap();
        for name in ["shounen", "Action", "drama"] {
            insert(&pool, CatalogKind::Genre, name).await.unwrap();
        }

        let names: Vec<String> = list_all(&pool, CatalogKind::Genre)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Action", "drama", "shounen"]);
    }
}
