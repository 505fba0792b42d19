//! Database models
//!
//! Row types shared by the admin service and the operator CLI. Password
//! hashes are loaded but never serialized.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

/// Staff or reader account
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub is_author: bool,
    pub created_at: NaiveDateTime,
}

/// Author, artist or genre
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub slug: Option<String>,
}

/// Manga title with the ids of its linked authors, artists and genres
#[derive(Debug, Clone, Serialize)]
pub struct Manga {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub views: i64,
    pub synopsis: Option<String>,
    pub year: i64,
    /// Object key of the cover image
    pub thumbnail: String,
    pub adult: bool,
    pub finished: bool,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub author_ids: Vec<i64>,
    pub artist_ids: Vec<i64>,
    pub genre_ids: Vec<i64>,
}

/// Chapter of a manga
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Chapter {
    pub id: i64,
    pub manga_id: i64,
    /// Chapter numbers may be fractional (e.g. 10.5 for an extra)
    pub number: f64,
    pub title: String,
    /// Object key of the chapter cover
    pub thumbnail: String,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
}

/// Single page image of a chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Page {
    pub id: i64,
    pub chapter_id: i64,
    pub number: i64,
    /// Object key of the page image
    pub url: String,
}

/// Parse a comma-separated id list as produced by `GROUP_CONCAT`
///
/// Unparsable fragments are dropped; `None` yields an empty list.
///
/// # Examples
///
/// ```
/// use fenix_common::db::parse_id_csv;
///
/// assert_eq!(parse_id_csv(Some("3,1,2")), vec![1, 2, 3]);
/// assert!(parse_id_csv(None).is_empty());
/// ```
pub fn parse_id_csv(csv: Option<&str>) -> Vec<i64> {
    let mut ids: Vec<i64> = csv
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Format a chapter number without a trailing `.0`
pub fn format_chapter_number(number: f64) -> String {
    if number.fract() == 0.0 {
        format!("{}", number as i64)
    } else {
        format!("{}", number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_csv_ignores_garbage() {
        assert_eq!(parse_id_csv(Some("1,,x, 4 ,4")), vec![1, 4]);
        assert!(parse_id_csv(Some("")).is_empty());
    }

    #[test]
    fn test_format_chapter_number() {
        assert_eq!(format_chapter_number(12.0), "12");
        assert_eq!(format_chapter_number(10.5), "10.5");
    }
}
