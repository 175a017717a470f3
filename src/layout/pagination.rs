use std::ops::Range;

pub const DEFAULT_DISPLAY_LIMIT: usize = 20;

/// Display-limit cursor over an insertion-ordered file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationController {
    page_size: usize,
    limit: usize,
    total: usize,
}

impl Default for PaginationController {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_LIMIT, 0)
    }
}

impl PaginationController {
    /// A page size of zero is treated as one.
    pub fn new(page_size: usize, total: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            limit: page_size.min(total),
            total,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn has_next_page(&self) -> bool {
        self.limit < self.total
    }

    /// Indices of the files currently shown.
    pub fn visible_range(&self) -> Range<usize> {
        0..self.limit
    }

    /// Grows the cursor by `increment`, never past the total.
    pub fn load_more(&mut self, increment: usize) {
        self.limit = self.limit.saturating_add(increment).min(self.total);
    }

    pub fn load_more_default(&mut self) {
        self.load_more(self.page_size);
    }

    /// Follows a change of the underlying file count. A shrinking set clamps
    /// the cursor; a set that was smaller than one page fills the first page.
    pub fn sync_total(&mut self, total: usize) {
        self.total = total;
        self.limit = self.limit.max(self.page_size.min(total)).min(total);
    }
}
