//! Lark/Feishu open API
//!
//! - `LarkClient`: typed wrappers over the endpoints the snapshot needs
//! - `envelope`: `{code, msg, data}` response handling
//! - `base_url`: Base URL parsing, including Wiki-embedded Bases

mod base_url;
mod client;
pub mod envelope;
mod types;

pub use client::{
    BatchWrite, LarkClient, ResolvedBase, DOWNLOAD_TIMEOUT, METADATA_TIMEOUT, RECORD_BATCH_SIZE,
    UPLOAD_TIMEOUT,
};
pub use base_url::{parse_base_url, BaseLocator};
pub use types::{AppInfo, AttachmentRef, FieldDef, Permission, Record, TableInfo, WikiNode};
