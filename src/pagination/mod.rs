//! Pagination module
//!
//! The vendor's list endpoints all use continuation tokens, so there is a single
//! strategy here with bounded page counts and a repeated-token guard.

mod strategies;
mod types;

pub use strategies::{CursorPaginator, MAX_FIELD_PAGES, MAX_RECORD_PAGES, MAX_TABLE_PAGES};
pub use types::{NextPage, PaginationState, StopReason};
