//! Database access layer
//!
//! One module per table group. Reads take the pool (or any executor when
//! they are also needed inside a transaction); multi-step writes take the
//! caller's transaction so a request commits or rolls back as a unit.

pub mod catalog;
pub mod chapters;
pub mod mangas;
pub mod pages;
pub mod sessions;
pub mod users;

use fenix_common::db::fold_case;

/// Build a `LIKE` pattern matching `text` anywhere, with `\` as escape
///
/// Use with `LIKE ? ESCAPE '\'`.
///
/// # Examples
/// ```
/// use fenix_admin::db::like_pattern;
///
/// assert_eq!(like_pattern("one"), "%one%");
/// assert_eq!(like_pattern("100%_"), "%100\\%\\_%");
/// ```
pub fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// `LIKE` pattern for a case-insensitive search against a folded column
///
/// Both sides go through [`fold_case`], so accented capitals match too.
pub fn search_pattern(text: &str) -> String {
    like_pattern(&fold_case(text))
}

/// Whether an error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_backslash() {
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_search_pattern_folds_non_ascii() {
        assert_eq!(search_pattern("AÇÃO"), "%ação%");
    }

    #[test]
    fn test_row_not_found_is_not_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
