//! Snapshot procedure
//!
//! # Overview
//!
//! - `SnapshotEngine::run` copies a source Base into a newly created one, table by
//!   table, converting dynamic fields on the way
//! - `SnapshotEngine::preview` lists what would be copied
//! - Request/result types shared with the HTTP surface

mod engine;
mod preview;
mod types;

pub use engine::{SnapshotEngine, DEFAULT_TABLE_NAMES, TABLE_SUFFIX_FORMAT};
pub use types::{
    BaseDescriptor, PreviewResult, SnapshotConfig, SnapshotError, SnapshotResult, TablePreview,
};
