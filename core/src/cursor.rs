//! Pagination cursor.
//!
//! Page indices are zero-based throughout the crate. A page size of 0 means
//! "no `max` parameter": the server decides how many items one page holds,
//! and only page 0 is addressable.

/// `(page_size, current_page)` governing single-page fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub page_size: u32,
    pub current_page: u32,
}

impl Cursor {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            current_page: 0,
        }
    }

    /// Item offset of `page`.
    pub fn offset(&self, page: u32) -> u64 {
        u64::from(page) * u64::from(self.page_size)
    }

    /// The `max` query parameter, if any.
    pub fn max(&self) -> Option<u64> {
        (self.page_size > 0).then(|| u64::from(self.page_size))
    }

    /// Index of the last page holding data for `total` items; 0 when empty.
    pub fn last_page(&self, total: u64) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        let pages = total.div_ceil(u64::from(self.page_size)).max(1);
        u32::try_from(pages - 1).unwrap_or(u32::MAX)
    }

    /// Clamp `page` into `[0, last_page(total)]`.
    pub fn clamp(&self, page: u32, total: u64) -> u32 {
        page.min(self.last_page(total))
    }
}
