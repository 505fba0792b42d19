//! Form parsing and validation
//!
//! Users and catalog entries are posted as JSON; mangas, chapters and
//! pages as `multipart/form-data` because they carry images. Validation
//! collects every field error before failing so the client can show
//! them all at once.

use crate::error::{ApiError, ApiResult, FieldErrors};
use axum::body::Bytes;
use axum::extract::Multipart;
use fenix_common::storage::extension_for_content_type;
use std::collections::HashMap;

/// Minimum length of names and titles (after trimming)
pub const MIN_NAME_LEN: usize = 3;

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Largest accepted cover or page image
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub const EMPTY_SELECTION: &str = "At least one option must be selected.";

// ========================================
// Multipart
// ========================================

/// File part of a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Multipart form read fully into memory
///
/// Parts with a filename are files, everything else is text. Browsers
/// send an empty part for a file input left blank; those are dropped.
/// A text field that appears more than once is joined with commas, so
/// `authors=1&authors=2` and `authors=1,2` read the same.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    if bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name: Some(file_name).filter(|f| !f.is_empty()),
                            content_type,
                            bytes,
                        },
                    );
                }
                None => {
                    let value = field.text().await?;
                    form.fields
                        .entry(name)
                        .and_modify(|existing| {
                            existing.push(',');
                            existing.push_str(&value);
                        })
                        .or_insert(value);
                }
            }
        }

        Ok(form)
    }

    /// Text field value
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Remove a file part from the form
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

// ========================================
// Validation
// ========================================

/// Collects field errors
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Err(Validation)` when any error was recorded
    pub fn finish(self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }

    /// Trimmed name of at least [`MIN_NAME_LEN`] characters
    pub fn name(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        let value = value.map(str::trim).unwrap_or_default();
        if value.chars().count() < MIN_NAME_LEN {
            self.add(
                field,
                format!("Must be at least {} characters long.", MIN_NAME_LEN),
            );
            return None;
        }
        Some(value.to_string())
    }

    /// Trimmed, lowercase e-mail address
    pub fn email(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        let value = value.map(str::trim).unwrap_or_default();
        if !is_valid_email(value) {
            self.add(field, "Please enter a valid e-mail address.");
            return None;
        }
        Some(value.to_ascii_lowercase())
    }

    /// Password of at least [`MIN_PASSWORD_LEN`] characters (not trimmed)
    pub fn password(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        let value = value.unwrap_or_default();
        if value.chars().count() < MIN_PASSWORD_LEN {
            self.add(
                field,
                format!("Must be at least {} characters long.", MIN_PASSWORD_LEN),
            );
            return None;
        }
        Some(value.to_string())
    }

    /// Integer greater than zero
    pub fn positive_int(&mut self, field: &str, value: Option<&str>) -> Option<i64> {
        match value.map(str::trim).and_then(|v| v.parse::<i64>().ok()) {
            Some(n) if n > 0 => Some(n),
            _ => {
                self.add(field, "Must be a positive whole number.");
                None
            }
        }
    }

    /// Finite number greater than zero (chapter numbers may be fractional)
    pub fn positive_number(&mut self, field: &str, value: Option<&str>) -> Option<f64> {
        match value.map(str::trim).and_then(|v| v.parse::<f64>().ok()) {
            Some(n) if n.is_finite() && n > 0.0 => Some(n),
            _ => {
                self.add(field, "Must be a positive number.");
                None
            }
        }
    }

    /// Non-empty comma-separated id list
    pub fn id_list(&mut self, field: &str, value: Option<&str>) -> Option<Vec<i64>> {
        match parse_id_list(value) {
            Ok(ids) => Some(ids),
            Err(message) => {
                self.add(field, message);
                None
            }
        }
    }

    /// Cover image: WebP only, at most [`MAX_IMAGE_BYTES`]
    pub fn cover(
        &mut self,
        field: &str,
        file: Option<UploadedFile>,
        required: bool,
    ) -> Option<UploadedFile> {
        let Some(file) = file else {
            if required {
                self.add(field, "An image is required.");
            }
            return None;
        };

        let is_webp = file
            .content_type
            .as_deref()
            .and_then(extension_for_content_type)
            == Some("webp");
        if !is_webp {
            self.add(field, "Only WebP images are accepted.");
            return None;
        }
        if file.bytes.len() > MAX_IMAGE_BYTES {
            self.add(field, "Image must be at most 10 MB.");
            return None;
        }
        Some(file)
    }

    /// Page image: WebP, JPEG or PNG, at most [`MAX_IMAGE_BYTES`]
    ///
    /// Returns the file and the key extension for its type.
    pub fn page_image(
        &mut self,
        field: &str,
        file: Option<UploadedFile>,
    ) -> Option<(UploadedFile, &'static str)> {
        let file = file?;

        let Some(extension) = file
            .content_type
            .as_deref()
            .and_then(extension_for_content_type)
        else {
            self.add(field, "Only WebP, JPEG or PNG images are accepted.");
            return None;
        };
        if file.bytes.len() > MAX_IMAGE_BYTES {
            self.add(field, "Image must be at most 10 MB.");
            return None;
        }
        Some((file, extension))
    }
}

/// Parse a comma-separated id list
///
/// Blank input is [`EMPTY_SELECTION`]; the result is sorted and deduplicated.
pub fn parse_id_list(value: Option<&str>) -> Result<Vec<i64>, String> {
    let parts: Vec<&str> = value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(EMPTY_SELECTION.to_string());
    }

    let mut ids = Vec::with_capacity(parts.len());
    for part in parts {
        match part.parse::<i64>() {
            Ok(id) if id > 0 => ids.push(id),
            _ => return Err(format!("Invalid option: {}", part)),
        }
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// HTML checkbox: present as `on` means checked, absent means unchecked
pub fn checkbox(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("on" | "true" | "1")
    )
}

/// Minimal address check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, len: usize) -> UploadedFile {
        UploadedFile {
            file_name: Some("cover.webp".to_string()),
            content_type: Some(content_type.to_string()),
            bytes: Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list(Some("3, 1,3")), Ok(vec![1, 3]));
        assert_eq!(parse_id_list(Some(" , ")), Err(EMPTY_SELECTION.to_string()));
        assert_eq!(parse_id_list(None), Err(EMPTY_SELECTION.to_string()));
        assert!(parse_id_list(Some("1,abc")).is_err());
        assert!(parse_id_list(Some("0")).is_err());
    }

    #[test]
    fn test_checkbox() {
        assert!(checkbox(Some("on")));
        assert!(checkbox(Some("ON")));
        assert!(!checkbox(Some("off")));
        assert!(!checkbox(None));
    }

    #[test]
    fn test_email() {
        assert!(is_valid_email("reader@fenix.dev"));
        assert!(!is_valid_email("reader@fenix"));
        assert!(!is_valid_email("@fenix.dev"));
        assert!(!is_valid_email("a b@fenix.dev"));
        assert!(!is_valid_email("a@@fenix.dev"));
    }

    #[test]
    fn test_validator_collects_all_errors() {
        let mut v = Validator::new();
        assert!(v.name("title", Some("  ab  ")).is_none());
        assert!(v.positive_int("year", Some("-1")).is_none());
        assert!(v.id_list("genres", Some("")).is_none());

        match v.finish() {
            Err(ApiError::Validation(errors)) => {
                assert_eq!(errors.len(), 3);
                assert_eq!(errors["genres"], vec![EMPTY_SELECTION.to_string()]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_cover_rules() {
        let mut v = Validator::new();
        assert!(v.cover("thumbnail", Some(upload("image/webp", 10)), true).is_some());
        assert!(v.cover("thumbnail", None, false).is_none());
        assert!(v.is_empty());

        assert!(v.cover("thumbnail", Some(upload("image/png", 10)), true).is_none());
        assert!(v.cover("thumbnail", None, true).is_none());
        assert!(v
            .cover("thumbnail", Some(upload("image/webp", MAX_IMAGE_BYTES + 1)), true)
            .is_none());
        assert!(!v.is_empty());
    }

    #[test]
    fn test_page_image_extension() {
        let mut v = Validator::new();
        let (_, ext) = v.page_image("image", Some(upload("image/jpeg", 4))).unwrap();
        assert_eq!(ext, "jpg");
        assert!(v.page_image("image", Some(upload("image/gif", 4))).is_none());
    }

    #[test]
    fn test_positive_number_accepts_fractions() {
        let mut v = Validator::new();
        assert_eq!(v.positive_number("number", Some("10.5")), Some(10.5));
        assert_eq!(v.positive_number("number", Some("0")), None);
        assert_eq!(v.positive_number("number", Some("NaN")), None);
    }
}
