//! Crawl progress cursor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The next unit of work to attempt: a page number and a row on that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 1-based listing page
    pub page: u32,

    /// 0-based row index on `page`
    pub row_index: usize,
}

impl Checkpoint {
    pub fn new(page: u32, row_index: usize) -> Self {
        Self {
            page: page.max(1),
            row_index,
        }
    }

    /// Cursor pointing just past `row_index` on the same page.
    pub fn after_row(page: u32, row_index: usize) -> Self {
        Self::new(page, row_index + 1)
    }

    /// Cursor at the first row of the page following `page`.
    pub fn next_page(page: u32) -> Self {
        Self::new(page + 1, 0)
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}, row {}", self.page, self.row_index)
    }
}
