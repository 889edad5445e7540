//! API handlers.

pub mod admin;
pub mod courses;
pub mod health;
pub mod lessons;
pub mod payments;
pub mod subscriptions;
pub mod users;
pub mod webhooks;

use course_hub_store::Page;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Largest page size a client may ask for.
pub const MAX_PAGE_SIZE: usize = 20;

/// Page-number pagination query parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    /// 1-based page number (default: 1).
    #[serde(default = "default_page")]
    pub page: usize,
    /// Items per page (default: 5, capped at 20).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl PageQuery {
    /// Effective `(limit, offset)` for the store.
    pub fn window(self) -> Result<(usize, usize), ApiError> {
        if self.page == 0 {
            return Err(ApiError::BadRequest("page must be at least 1".into()));
        }
        let limit = self.page_size.clamp(1, MAX_PAGE_SIZE);
        Ok((limit, (self.page - 1) * limit))
    }
}

/// One page of results.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    /// Total number of items across all pages.
    pub count: usize,
    /// This page's number.
    pub page: usize,
    /// Items per page.
    pub page_size: usize,
    /// Items on this page.
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    /// Wrap a store page, rejecting pages past the end.
    pub fn from_page<S>(
        query: PageQuery,
        page: Page<S>,
        project: impl FnMut(S) -> T,
    ) -> Result<Self, ApiError> {
        let (limit, offset) = query.window()?;
        if query.page > 1 && offset >= page.total {
            return Err(ApiError::NotFound("Invalid page".into()));
        }
        Ok(Self {
            count: page.total,
            page: query.page,
            page_size: limit,
            results: page.items.into_iter().map(project).collect(),
        })
    }
}
