use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Pagination metadata included in list responses.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Pagination {
    /// Current page number (1-based).
    #[schema(example = 1)]
    pub page: u64,
    /// Number of items per page.
    #[schema(example = 20)]
    pub per_page: u64,
    /// Total number of matching items across all pages.
    #[schema(example = 47)]
    pub total: u64,
    /// Total number of pages.
    #[schema(example = 3)]
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        Self {
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page.max(1)),
        }
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Page selection shared by list endpoints.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// Page number (1-indexed).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (1-100).
    #[param(example = 20)]
    pub per_page: Option<u64>,
}

impl PageQuery {
    /// Resolve to `(page, per_page)`, rejecting out-of-range values.
    pub fn resolve(&self, default_per_page: u64) -> Result<(u64, u64), AppError> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::Validation("page must be >= 1".into()));
        }
        let per_page = self.per_page.unwrap_or(default_per_page);
        if !(1..=100).contains(&per_page) {
            return Err(AppError::Validation("per_page must be 1-100".into()));
        }
        Ok((page, per_page))
    }
}

/// Share of `quota` taken by `used`, in `[0, 100]`.
pub fn usage_percent(used: i64, quota: i64) -> f64 {
    if quota <= 0 {
        return if used > 0 { 100.0 } else { 0.0 };
    }
    (used as f64 / quota as f64 * 100.0).clamp(0.0, 100.0)
}
