//! CLI module
//!
//! # Commands
//!
//! - `serve` - Start the HTTP server behind the snapshot UI
//! - `snapshot` - Copy a Base and print the result
//! - `preview` - List the tables a snapshot would copy

mod commands;
mod runner;
mod server;

pub use commands::{Cli, Commands, LarkArgs};
pub use runner::Runner;
pub use server::{router, serve, AppState, SESSION_COOKIE, TOKEN_COOKIE};
