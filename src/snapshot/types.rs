//! Snapshot request, result and preview types
//!
//! These are the JSON shapes of the HTTP surface, so they serialize in camelCase.

use crate::lark::AppInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What to copy and how
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotConfig {
    /// URL of the source Base (direct or Wiki-embedded)
    pub source_base_url: String,
    /// Name of the Base to create
    pub target_base_name: String,
    /// Grant the signed-in user full access to the new Base
    #[serde(default)]
    pub grant_admin_permission: bool,
    /// Copy attachment files instead of flattening them to names
    #[serde(default)]
    pub preserve_attachments: bool,
    /// Restrict the copy to these table ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_table_ids: Option<Vec<String>>,
}

impl SnapshotConfig {
    /// Create a config copying every table
    pub fn new(source_base_url: impl Into<String>, target_base_name: impl Into<String>) -> Self {
        Self {
            source_base_url: source_base_url.into(),
            target_base_name: target_base_name.into(),
            ..Self::default()
        }
    }

    /// Set the grant-admin flag
    #[must_use]
    pub fn with_grant_admin(mut self, grant: bool) -> Self {
        self.grant_admin_permission = grant;
        self
    }

    /// Set the preserve-attachments flag
    #[must_use]
    pub fn with_preserve_attachments(mut self, preserve: bool) -> Self {
        self.preserve_attachments = preserve;
        self
    }

    /// Restrict the copy to some tables
    #[must_use]
    pub fn with_selected_tables(mut self, table_ids: Vec<String>) -> Self {
        self.selected_table_ids = Some(table_ids);
        self
    }

    /// Whether a table is part of the copy; an empty selection selects everything
    pub fn includes_table(&self, table_id: &str) -> bool {
        match &self.selected_table_ids {
            Some(ids) if !ids.is_empty() => ids.iter().any(|id| id == table_id),
            _ => true,
        }
    }
}

/// A Base as reported to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseDescriptor {
    pub app_token: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<AppInfo> for BaseDescriptor {
    fn from(app: AppInfo) -> Self {
        Self {
            app_token: app.app_token,
            name: app.name,
            url: app.url,
        }
    }
}

/// One failure met during a snapshot, located as precisely as known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl SnapshotError {
    /// An error not tied to a table
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            table: None,
            record: None,
            field: None,
            message: message.into(),
        }
    }

    /// An error affecting a whole table
    pub fn table(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Self::general(message)
        }
    }

    /// An error affecting one cell
    pub fn cell(
        table: impl Into<String>,
        record: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            table: Some(table.into()),
            record: Some(record.into()),
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

/// Outcome of a snapshot
///
/// `success` is false only when no target Base could be set up; partial failures
/// after that are listed in `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResult {
    pub success: bool,
    pub source_base: BaseDescriptor,
    pub target_base: BaseDescriptor,
    pub tables_processed: usize,
    pub records_processed: usize,
    pub fields_converted: usize,
    pub errors: Vec<SnapshotError>,
    pub created_at: DateTime<Utc>,
}

impl SnapshotResult {
    /// A successful result with no work recorded yet
    pub fn started(source: BaseDescriptor, target: BaseDescriptor) -> Self {
        Self {
            success: true,
            source_base: source,
            target_base: target,
            tables_processed: 0,
            records_processed: 0,
            fields_converted: 0,
            errors: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// A failed result carrying a single error
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![SnapshotError::general(message)],
            ..Self::started(BaseDescriptor::default(), BaseDescriptor::default())
        }
    }

    /// Record a copied table
    pub fn add_table(&mut self) {
        self.tables_processed += 1;
    }

    /// Record written records
    pub fn add_records(&mut self, count: usize) {
        self.records_processed += count;
    }

    /// Record converted fields
    pub fn add_converted_fields(&mut self, count: usize) {
        self.fields_converted += count;
    }

    /// Record an error
    pub fn add_error(&mut self, error: SnapshotError) {
        self.errors.push(error);
    }

    /// Whether any error was recorded
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Summary of one source table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub table_id: String,
    pub name: String,
    pub field_count: usize,
    pub dynamic_field_count: usize,
}

/// What a snapshot of a Base would copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub source_base: BaseDescriptor,
    pub table_id_from_url: Option<String>,
    pub tables: Vec<TablePreview>,
}
