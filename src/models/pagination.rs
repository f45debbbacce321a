//! Pagination primitives shared by the chat and space list endpoints.

use serde::{Deserialize, Serialize};

/// Pagination query parameters (`?size=10&page=1`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl Pagination {
    /// Maximum items per page.
    const MAX_SIZE: i64 = 100;

    /// Default items per page.
    const DEFAULT_SIZE: i64 = 10;

    pub fn limit(&self) -> i64 {
        self.size
            .unwrap_or(Self::DEFAULT_SIZE)
            .clamp(1, Self::MAX_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.current_page() - 1).saturating_mul(self.limit())
    }

    pub fn current_page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }
}

/// Paged result envelope returned by list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub total_pages: i64,
}

impl<T: Serialize> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        let size = pagination.limit();
        let total_pages = (total + size - 1) / size;
        Self {
            items,
            total,
            page: pagination.current_page(),
            size,
            total_pages,
        }
    }
}
