//! Pagination state and page helpers.
//!
//! [`Pagination`] is what a builder accumulates from `range` and `limit` calls.
//! [`PaginationParams`] converts the page/per-page parameters route handlers
//! receive into an inclusive index range, and [`Page`] wraps a counted result
//! with navigation metadata.

use serde::{Deserialize, Serialize};

use crate::{
    document::Row,
    error::{ErrorBody, StoreError, StoreResult},
    result::{Data, QueryResult},
};

/// Pagination requested on a builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pagination {
    /// No pagination; the backend decides how many documents to return.
    #[default]
    Unset,
    /// Set by `limit(n)`.
    Limit(usize),
    /// Set by `range(start, end)`.
    Range { offset: usize, limit: usize },
}

impl Pagination {
    /// Converts an inclusive, zero-based index range into offset and limit.
    ///
    /// An `end` before `start` selects nothing.
    pub fn range(start: usize, end: usize) -> Self {
        Pagination::Range {
            offset: start,
            limit: end.checked_sub(start).map_or(0, |span| span.saturating_add(1)),
        }
    }

    /// Combines the current state with a new request.
    ///
    /// Repeating the same kind of call replaces the previous value. Mixing
    /// `range` and `limit` is rejected.
    pub fn merge(self, next: Pagination) -> StoreResult<Pagination> {
        match (self, next) {
            (Pagination::Unset, next) => Ok(next),
            (current, Pagination::Unset) => Ok(current),
            (Pagination::Limit(_), Pagination::Limit(n)) => Ok(Pagination::Limit(n)),
            (Pagination::Range { .. }, next @ Pagination::Range { .. }) => Ok(next),
            (Pagination::Range { .. }, Pagination::Limit(_)) => Err(StoreError::ConflictingPagination(
                "limit() called after range(); use one or the other".to_string(),
            )),
            (Pagination::Limit(_), Pagination::Range { .. }) => Err(StoreError::ConflictingPagination(
                "range() called after limit(); use one or the other".to_string(),
            )),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Pagination::Unset => None,
            Pagination::Limit(limit) | Pagination::Range { limit, .. } => Some(*limit),
        }
    }

    pub fn offset(&self) -> Option<usize> {
        match self {
            Pagination::Range { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// A single page of rows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Rows returned for the requested page.
    pub items: Vec<T>,
    /// Rows matching the filters, ignoring pagination.
    pub count: u64,
    /// Set while rows remain after this page.
    pub next_page: Option<usize>,
    /// Unset on page 1.
    pub previous_page: Option<usize>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

impl Page<Row> {
    /// Builds a page from the result of a counted, paginated read.
    ///
    /// Errors in the envelope are passed through. A result without an exact
    /// count only knows the rows seen so far.
    pub fn from_result(result: QueryResult, params: &PaginationParams) -> Result<Self, ErrorBody> {
        let count = result.count;
        let items = result
            .into_result()?
            .map(Data::into_rows)
            .unwrap_or_default();
        let seen = params.offset().saturating_add(items.len()) as u64;
        let count = count.unwrap_or(seen);

        Ok(Page {
            items,
            count,
            next_page: (seen < count).then_some(params.page + 1),
            previous_page: (params.page > 1).then(|| params.page - 1),
        })
    }
}

/// Parameters for paginating through large result sets.
///
/// Pages are 1-indexed (page 1 is the first page).
///
/// # Example
///
/// ```ignore
/// use rowlayer::page::PaginationParams;
///
/// let params = PaginationParams::new(3, 20);
/// assert_eq!(params.offset(), 40);
/// assert_eq!(params.range(), (40, 59));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page: page.max(1), per_page }
    }

    /// Number of items to skip before this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// Inclusive index range covering this page, as passed to `range(start, end)`.
    ///
    /// A page size of zero yields an empty range.
    pub fn range(&self) -> (usize, usize) {
        let start = self.offset();
        match self.per_page {
            0 => (start.saturating_add(1), start),
            per_page => (start, start.saturating_add(per_page - 1)),
        }
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}
