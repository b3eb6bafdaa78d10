//! Pagination for the admin data browser (100 rows/page)

use serde::Serialize;

/// Rows per admin data page
pub const PAGE_SIZE: i64 = 100;

/// Page window over a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Total rows in the result set
    pub count: i64,
    /// Current page (1-indexed), clamped into range
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    #[serde(skip)]
    pub offset: i64,
}

impl Pagination {
    /// Window for `requested_page` over `count` rows
    ///
    /// Out-of-range pages are clamped to the first or last page; an empty
    /// result set has zero pages and stays on page 1.
    pub fn new(count: i64, requested_page: i64) -> Self {
        let count = count.max(0);
        let total_pages = (count + PAGE_SIZE - 1) / PAGE_SIZE;
        let page = requested_page.clamp(1, total_pages.max(1));

        Self {
            count,
            page,
            page_size: PAGE_SIZE,
            total_pages,
            offset: (page - 1) * PAGE_SIZE,
        }
    }
}
