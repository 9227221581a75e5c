use serde::{Deserialize, Serialize};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A 1-based page request.
///
/// Zero values are treated as "use the default", so a request deserialized
/// from an empty query string asks for the first page of ten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Returns the 1-based page number.
    pub fn page(&self) -> u32 {
        if self.page == 0 { 1 } else { self.page }
    }

    /// Returns the page size.
    pub fn page_size(&self) -> u32 {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Number of rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.page_size())
    }

    /// Number of pages needed to show `total` rows.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.page_size()))
    }
}
