// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Base Snapshot
//!
//! Copies a Lark/Feishu Base into a new Base whose fields are all static.
//! Formula, lookup, link, user and other computed columns become plain text
//! (or numbers), so the copy keeps the values it showed at snapshot time.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use base_snapshot::config::LarkConfig;
//! use base_snapshot::snapshot::{SnapshotConfig, SnapshotEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (client, _) = LarkConfig::new("cli_xxx", "secret").build_clients("");
//!     let engine = SnapshotEngine::new(client);
//!
//!     let config = SnapshotConfig::new("https://x.larksuite.com/base/bascnXXX", "Q3 frozen");
//!     let result = engine.run(&config).await;
//!     println!("{} tables, {} records", result.tables_processed, result.records_processed);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │        CLI (snapshot, preview)    HTTP server (serve)     │
//! └─────────────────────────────┬─────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┴─────────────────────────────┐
//! │  Snapshot engine: setup → tables → records → permissions  │
//! └──────┬──────────────────────┬──────────────────────┬──────┘
//!        │                      │                      │
//! ┌──────┴──────┐      ┌────────┴────────┐     ┌───────┴──────┐
//! │   Convert   │      │   Lark client   │     │     Auth     │
//! ├─────────────┤      ├─────────────────┤     ├──────────────┤
//! │ Field kinds │      │ Envelope        │     │ Tenant token │
//! │ Properties  │      │ Pagination      │     │ OAuth        │
//! │ Values      │      │ Retry/Rate limit│     │ Sessions     │
//! └─────────────┘      └─────────────────┘     └──────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP client with retry and rate limiting
pub mod http;

/// Continuation-token pagination
pub mod pagination;

/// Tenant tokens, OAuth and sessions
pub mod auth;

/// Typed client for the Base open API
pub mod lark;

/// Field and value conversion to static kinds
pub mod convert;

/// Snapshot orchestration
pub mod snapshot;

/// Application configuration
pub mod config;

/// Command-line interface and HTTP server
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use snapshot::{SnapshotConfig, SnapshotEngine, SnapshotResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
