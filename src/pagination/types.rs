//! Pagination types
//!
//! Defines the state tracked while walking a continuation-token listing.

/// Result of the next page computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
    /// Fetch again; the new cursor is in [`PaginationState::cursor`]
    Continue,
    /// No more pages
    Done(StopReason),
}

/// Why a listing stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The server reported no further pages
    Exhausted,
    /// The server handed back the continuation token it just gave us
    RepeatedToken,
    /// The page cap was reached while the server still reported more
    PageLimit,
}

impl StopReason {
    /// Whether the listing may be incomplete
    pub fn is_truncated(self) -> bool {
        !matches!(self, Self::Exhausted)
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Pages fetched so far
    pub page: u32,
    /// Current continuation token
    pub cursor: Option<String>,
    /// Total items fetched so far
    pub total_fetched: u64,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment page number
    pub fn next_page(&mut self) {
        self.page += 1;
    }

    /// Set cursor
    pub fn set_cursor(&mut self, cursor: String) {
        self.cursor = Some(cursor);
    }

    /// Add to total fetched
    pub fn add_fetched(&mut self, count: u64) {
        self.total_fetched += count;
    }
}
