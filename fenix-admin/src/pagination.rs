//! Pagination utilities
//!
//! Every admin list uses a fixed page size of 20.

use serde::{Deserialize, Serialize};

/// Page size constant for all pagination
pub const PAGE_SIZE: i64 = 20;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Calculate pagination metadata from total results and requested page
///
/// Pages below 1 are treated as 1. Pages past the end are kept as
/// requested and simply yield no rows.
///
/// # Examples
/// ```
/// use fenix_admin::pagination::calculate_pagination;
///
/// // 45 results = 3 pages (20 + 20 + 5)
/// let p = calculate_pagination(45, 2);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 20);
///
/// let p = calculate_pagination(45, -4);
/// assert_eq!(p.page, 1);
/// assert_eq!(p.offset, 0);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64) -> Pagination {
    let total_pages = (total_results.max(0) + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested_page.max(1);
    let offset = (page - 1) * PAGE_SIZE;

    Pagination {
        page,
        total_pages,
        offset,
    }
}

/// `?page=&query=` parameters shared by list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub query: Option<String>,
}

impl ListQuery {
    /// Requested page (defaults to 1)
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    /// Trimmed search text, `None` when blank
    pub fn search(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// One page of a list response
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total_count: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total_count,
            page: pagination.page,
            page_size: PAGE_SIZE,
            total_pages: pagination.total_pages,
        }
    }

    /// Convert every item, keeping the page metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}
