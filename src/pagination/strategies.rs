//! Continuation-token pagination
//!
//! Every bitable list endpoint answers with `{items, has_more, page_token}`.

use super::types::{NextPage, PaginationState, StopReason};
use std::collections::HashMap;
use tracing::warn;

/// Page cap for table listings
pub const MAX_TABLE_PAGES: u32 = 10;
/// Page cap for field listings
pub const MAX_FIELD_PAGES: u32 = 10;
/// Page cap for record listings
pub const MAX_RECORD_PAGES: u32 = 100;

/// Cursor-based pagination over `page_token`
///
/// Besides `has_more`, two guards end the walk: a continuation token equal to the
/// previous one, and a hard page cap. Both work around servers that keep reporting
/// `has_more` with a stale token; the underlying cause has not been diagnosed.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Query parameter name for the cursor
    pub cursor_param: String,
    /// Query parameter name for the page size
    pub page_size_param: String,
    /// Items requested per page
    pub page_size: u32,
    /// Maximum number of pages to fetch
    pub max_pages: u32,
}

impl CursorPaginator {
    /// Create a new cursor paginator using the vendor's parameter names
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        Self {
            cursor_param: "page_token".to_string(),
            page_size_param: "page_size".to_string(),
            page_size,
            max_pages,
        }
    }

    /// Paginator for table listings
    pub fn tables() -> Self {
        Self::new(100, MAX_TABLE_PAGES)
    }

    /// Paginator for field listings
    pub fn fields() -> Self {
        Self::new(100, MAX_FIELD_PAGES)
    }

    /// Paginator for record listings
    pub fn records() -> Self {
        Self::new(500, MAX_RECORD_PAGES)
    }

    /// Query parameters for the next request
    pub fn params(&self, state: &PaginationState) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert(self.page_size_param.clone(), self.page_size.to_string());
        if let Some(cursor) = &state.cursor {
            params.insert(self.cursor_param.clone(), cursor.clone());
        }
        params
    }

    /// Record a fetched page and decide whether to continue
    pub fn process_page(
        &self,
        has_more: bool,
        page_token: Option<&str>,
        items_count: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        state.add_fetched(items_count as u64);
        state.next_page();

        let token = match page_token.filter(|t| !t.is_empty()) {
            Some(token) if has_more => token,
            _ => {
                return NextPage::Done(StopReason::Exhausted);
            }
        };

        if state.cursor.as_deref() == Some(token) {
            warn!(
                page = state.page,
                "Server repeated continuation token, stopping pagination"
            );
            return NextPage::Done(StopReason::RepeatedToken);
        }

        if state.page >= self.max_pages {
            warn!(
                max_pages = self.max_pages,
                fetched = state.total_fetched,
                "Page limit reached, listing may be incomplete"
            );
            return NextPage::Done(StopReason::PageLimit);
        }

        state.set_cursor(token.to_string());
        NextPage::Continue
    }
}
