//! Page-number pagination shared by the history listings.

use serde::Serialize;
use utoipa::ToSchema;

/// Upper bound on a single page.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Build a request, clamping `page` to at least 1 and `limit` to
    /// `1..=MAX_PAGE_SIZE`.
    ///
    /// # Examples
    /// ```
    /// use cervello::domain::PageRequest;
    ///
    /// let page = PageRequest::new(Some(0), Some(500), 10);
    /// assert_eq!((page.page(), page.limit()), (1, 100));
    /// ```
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// One-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Page size.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of records to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

/// Pagination block returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Total number of matching records.
    pub total: u64,
    /// Current page.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Number of pages.
    pub total_pages: u64,
}

impl PageInfo {
    /// Describe `total` results paged by `request`.
    #[must_use]
    pub fn new(total: u64, request: PageRequest) -> Self {
        Self {
            total,
            page: request.page(),
            limit: request.limit(),
            total_pages: total.div_ceil(u64::from(request.limit())),
        }
    }
}

/// A page of items plus its pagination block.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Pagination details.
    pub info: PageInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 10, 0)]
    #[case(1, 10, 1)]
    #[case(10, 10, 1)]
    #[case(11, 10, 2)]
    #[case(45, 20, 3)]
    fn total_pages_rounds_up(#[case] total: u64, #[case] limit: u32, #[case] pages: u64) {
        let info = PageInfo::new(total, PageRequest::new(None, Some(limit), 10));
        assert_eq!(info.total_pages, pages);
    }

    #[rstest]
    fn offset_is_zero_based() {
        let request = PageRequest::new(Some(3), Some(20), 20);
        assert_eq!(request.offset(), 40);
    }
}
