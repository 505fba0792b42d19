//! Bulk page import from a ZIP archive
//!
//! Each image in the archive becomes one page of the chapter. The page
//! number comes from the leading digits of the file name, so `007.webp`
//! is page 7 and `12-final.png` is page 12. Importing over existing pages
//! replaces them; pages with numbers absent from the archive are kept.

use fenix_common::storage::{content_type_for_extension, extension_for_content_type, page_key};
use fenix_common::MediaStore;
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use thiserror::Error;
use tracing::{info, warn};
use zip::ZipArchive;

use crate::db::{chapters, pages};
use crate::error::ApiError;

/// Largest accepted archive
pub const MAX_ZIP_BYTES: usize = 100 * 1024 * 1024;

/// Largest accepted image inside the archive (decompressed)
pub const MAX_PAGE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("The uploaded file is empty.")]
    EmptyArchive,

    #[error("The ZIP file must be at most 100 MB.")]
    ArchiveTooLarge,

    #[error("Only .zip files are accepted.")]
    NotZip,

    #[error("Invalid ZIP archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),

    #[error("Image {0} is larger than 10 MB.")]
    EntryTooLarge(String),

    #[error("No valid images found in the ZIP.")]
    NoImages,

    #[error("Chapter {0} not found")]
    ChapterNotFound(i64),

    #[error("Could not read archive entry: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] fenix_common::Error),

    #[error("Import task failed: {0}")]
    Task(String),
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::EmptyArchive | ImportError::NotZip => {
                ApiError::field("zipfile", err.to_string())
            }
            ImportError::ArchiveTooLarge => ApiError::PayloadTooLarge(err.to_string()),
            ImportError::InvalidArchive(_)
            | ImportError::EntryTooLarge(_)
            | ImportError::NoImages
            | ImportError::Io(_) => ApiError::BadRequest(err.to_string()),
            ImportError::ChapterNotFound(_) => ApiError::NotFound(err.to_string()),
            ImportError::Database(e) => ApiError::Database(e),
            ImportError::Storage(e) => ApiError::Common(e),
            ImportError::Task(msg) => ApiError::Internal(msg),
        }
    }
}

/// Image taken from the archive
#[derive(Debug)]
pub struct ExtractedPage {
    pub number: i64,
    pub entry_name: String,
    /// Key extension (`webp`, `jpg` or `png`)
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Result of reading an archive
#[derive(Debug)]
pub struct Extraction {
    /// One image per page number, ascending
    pub pages: Vec<ExtractedPage>,
    /// Images that were not imported (no page number, or replaced by a
    /// later entry with the same number)
    pub skipped: Vec<String>,
}

/// Outcome of an import
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub chapter_id: i64,
    pub imported: usize,
    pub skipped: usize,
    pub skipped_entries: Vec<String>,
}

/// Page number from the leading digits of an entry's file name
///
/// # Examples
/// ```
/// use fenix_admin::import::page_number_from_name;
///
/// assert_eq!(page_number_from_name("vol1/007.webp"), Some(7));
/// assert_eq!(page_number_from_name("12-final.png"), Some(12));
/// assert_eq!(page_number_from_name("cover.jpg"), None);
/// assert_eq!(page_number_from_name("000.jpg"), None);
/// ```
pub fn page_number_from_name(entry_name: &str) -> Option<i64> {
    let digits: String = base_name(entry_name)
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<i64>().ok().filter(|n| *n > 0)
}

fn base_name(entry_name: &str) -> &str {
    entry_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(entry_name)
}

/// Key extension for an entry that should be imported
///
/// Skips macOS resource forks, hidden files and anything that is not a
/// WebP, JPEG or PNG image.
fn image_extension(entry_name: &str) -> Option<&'static str> {
    if entry_name.to_ascii_lowercase().starts_with("__macosx") {
        return None;
    }
    let base = base_name(entry_name);
    if base.starts_with('.') {
        return None;
    }
    let (_, extension) = base.rsplit_once('.')?;
    content_type_for_extension(extension).and_then(extension_for_content_type)
}

/// Reject uploads that cannot be a usable archive
pub fn check_archive(file_name: Option<&str>, len: usize) -> Result<(), ImportError> {
    if len == 0 {
        return Err(ImportError::EmptyArchive);
    }
    if len > MAX_ZIP_BYTES {
        return Err(ImportError::ArchiveTooLarge);
    }
    let is_zip = file_name
        .map(|name| name.trim().to_ascii_lowercase().ends_with(".zip"))
        .unwrap_or(false);
    if !is_zip {
        return Err(ImportError::NotZip);
    }
    Ok(())
}

/// Read every importable image from an archive (blocking)
pub fn extract_pages(data: &[u8]) -> Result<Extraction, ImportError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut by_number: BTreeMap<i64, ExtractedPage> = BTreeMap::new();
    let mut skipped = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }

        let entry_name = entry.name().to_string();
        let Some(extension) = image_extension(&entry_name) else {
            continue;
        };

        let Some(number) = page_number_from_name(&entry_name) else {
            warn!("Skipping {}: file name does not start with a page number", entry_name);
            skipped.push(entry_name);
            continue;
        };

        if entry.size() > MAX_PAGE_BYTES {
            return Err(ImportError::EntryTooLarge(entry_name));
        }
        // The header size can lie; never read past the limit
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.by_ref().take(MAX_PAGE_BYTES + 1).read_to_end(&mut bytes)?;
        if bytes.len() as u64 > MAX_PAGE_BYTES {
            return Err(ImportError::EntryTooLarge(entry_name));
        }

        let page = ExtractedPage {
            number,
            entry_name,
            extension,
            bytes,
        };
        if let Some(replaced) = by_number.insert(number, page) {
            warn!(
                "Page {} appears more than once; {} replaces {}",
                number,
                by_number[&number].entry_name,
                replaced.entry_name
            );
            skipped.push(replaced.entry_name);
        }
    }

    if by_number.is_empty() {
        return Err(ImportError::NoImages);
    }

    Ok(Extraction {
        pages: by_number.into_values().collect(),
        skipped,
    })
}

/// Import a ZIP archive into a chapter
///
/// Uploads and row upserts share one transaction. On failure the
/// transaction rolls back and freshly written objects are removed; on
/// success objects of replaced pages stored under another key are removed.
pub async fn import_zip(
    db: &SqlitePool,
    media: &MediaStore,
    chapter_id: i64,
    file_name: Option<&str>,
    data: Vec<u8>,
) -> Result<ImportReport, ImportError> {
    check_archive(file_name, data.len())?;

    let chapter = chapters::find(db, chapter_id)
        .await?
        .ok_or(ImportError::ChapterNotFound(chapter_id))?;

    let extraction = tokio::task::spawn_blocking(move || extract_pages(&data))
        .await
        .map_err(|e| ImportError::Task(e.to_string()))??;

    let imported = extraction.pages.len();
    let mut written = Vec::new();
    let mut stale = Vec::new();

    let mut tx = db.begin().await?;
    let stored = store_pages(
        &mut tx,
        media,
        chapter.manga_id,
        chapter.id,
        extraction.pages,
        &mut written,
        &mut stale,
    )
    .await;

    if let Err(e) = stored {
        if let Err(rollback_err) = tx.rollback().await {
            warn!("Rollback failed: {}", rollback_err);
        }
        media.discard(&written).await;
        return Err(e);
    }
    if let Err(e) = tx.commit().await {
        media.discard(&written).await;
        return Err(e.into());
    }

    media.discard(&stale).await;

    info!(
        "Imported {} page(s) into chapter {} ({} skipped)",
        imported,
        chapter.id,
        extraction.skipped.len()
    );

    Ok(ImportReport {
        chapter_id: chapter.id,
        imported,
        skipped: extraction.skipped.len(),
        skipped_entries: extraction.skipped,
    })
}

async fn store_pages(
    tx: &mut Transaction<'_, Sqlite>,
    media: &MediaStore,
    manga_id: i64,
    chapter_id: i64,
    extracted: Vec<ExtractedPage>,
    written: &mut Vec<String>,
    stale: &mut Vec<String>,
) -> Result<(), ImportError> {
    for page in extracted {
        let key = page_key(manga_id, chapter_id, page.number, page.extension);
        let content_type =
            content_type_for_extension(page.extension).unwrap_or("application/octet-stream");

        media.put(&key, page.bytes, content_type).await?;
        match pages::upsert(tx, chapter_id, page.number, &key).await? {
            None => written.push(key),
            Some(previous) if previous != key => {
                written.push(key);
                stale.push(previous);
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_filters_entries() {
        let data = build_zip(&[
            ("pages/", b""),
            ("pages/001.webp", b"one"),
            ("pages/002.JPEG", b"two"),
            ("__MACOSX/pages/._001.webp", b"fork"),
            ("__macosx/pages/003.webp", b"fork"),
            ("__MacOSX/004.png", b"fork"),
            ("pages/.DS_Store", b"junk"),
            ("pages/notes.txt", b"text"),
            ("pages/credits.png", b"no number"),
        ]);

        let extraction = extract_pages(&data).unwrap();
        let numbers: Vec<i64> = extraction.pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(extraction.pages[1].extension, "jpg");
        assert_eq!(extraction.skipped, vec!["pages/credits.png".to_string()]);
    }

    #[test]
    fn test_later_duplicate_wins() {
        let data = build_zip(&[("a/1.webp", b"first"), ("b/01.png", b"second")]);

        let extraction = extract_pages(&data).unwrap();
        assert_eq!(extraction.pages.len(), 1);
        assert_eq!(extraction.pages[0].bytes, b"second");
        assert_eq!(extraction.pages[0].extension, "png");
        assert_eq!(extraction.skipped, vec!["a/1.webp".to_string()]);
    }

    #[test]
    fn test_no_images() {
        let data = build_zip(&[("readme.txt", b"hi"), ("cover.webp", b"no number")]);
        assert!(matches!(extract_pages(&data), Err(ImportError::NoImages)));
    }

    #[test]
    fn test_oversized_entry_fails() {
        let big = vec![0u8; (MAX_PAGE_BYTES + 1) as usize];
        let data = build_zip(&[("1.webp", &big)]);
        assert!(matches!(extract_pages(&data), Err(ImportError::EntryTooLarge(_))));
    }

    #[test]
    fn test_garbage_is_invalid_archive() {
        assert!(matches!(
            extract_pages(b"definitely not a zip"),
            Err(ImportError::InvalidArchive(_))
        ));
    }

    #[test]
    fn test_check_archive() {
        assert!(matches!(check_archive(Some("ch1.zip"), 0), Err(ImportError::EmptyArchive)));
        assert!(matches!(
            check_archive(Some("ch1.zip"), MAX_ZIP_BYTES + 1),
            Err(ImportError::ArchiveTooLarge)
        ));
        assert!(matches!(check_archive(Some("ch1.rar"), 10), Err(ImportError::NotZip)));
        assert!(matches!(check_archive(None, 10), Err(ImportError::NotZip)));
        assert!(check_archive(Some("CH1.ZIP"), 10).is_ok());
    }

    #[test]
    fn test_windows_separators() {
        assert_eq!(page_number_from_name("vol\\003.png"), Some(3));
        assert_eq!(image_extension("vol\\.hidden.png"), None);
    }
}
