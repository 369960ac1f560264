//! Record conversion

use super::field::ConvertedField;
use super::kind::FieldKind;
use super::value::convert_value;
use crate::lark::{AttachmentRef, Record};
use crate::types::{JsonObject, JsonValue};
use std::collections::HashSet;
use tracing::warn;

/// Attachments of one cell that still have to be copied into the target Base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachments {
    pub field_name: String,
    pub files: Vec<AttachmentRef>,
}

/// A converted record ready for batch insertion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedRecord {
    /// Source record id, for error reporting
    pub record_id: String,
    /// Values keyed by target field name
    pub fields: JsonObject,
    /// Attachment cells to transfer before writing
    pub attachments: Vec<PendingAttachments>,
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    source_kind: FieldKind,
    target_kind: FieldKind,
}

/// Converts source records against the fields that exist in the target table
#[derive(Debug, Clone)]
pub struct RecordConverter {
    columns: Vec<Column>,
    skipped: Vec<String>,
}

impl RecordConverter {
    /// Build a converter from the converted source fields and the target's field names
    ///
    /// Columns follow the source field order. Source fields the target does not
    /// have are skipped.
    pub fn new<'a>(
        fields: &[ConvertedField],
        target_field_names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let target: HashSet<&str> = target_field_names.into_iter().collect();
        let mut columns = Vec::with_capacity(fields.len());
        let mut skipped = Vec::new();

        for field in fields {
            let name = &field.definition.field_name;
            if target.contains(name.as_str()) {
                columns.push(Column {
                    name: name.clone(),
                    source_kind: field.source_kind,
                    target_kind: field.target_kind,
                });
            } else {
                skipped.push(name.clone());
            }
        }

        Self { columns, skipped }
    }

    /// Source fields missing from the target table
    pub fn skipped_fields(&self) -> &[String] {
        &self.skipped
    }

    /// Number of fields carried into the target
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Convert one record; null, absent and unconvertible values are omitted
    pub fn convert(&self, record: &Record) -> ConvertedRecord {
        let mut converted = ConvertedRecord {
            record_id: record.record_id.clone(),
            ..ConvertedRecord::default()
        };

        for column in &self.columns {
            let Some(value) = record.fields.get(&column.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            if column.source_kind == FieldKind::Attachment
                && column.target_kind == FieldKind::Attachment
            {
                if let Some(files) = attachment_refs(&record.record_id, &column.name, value) {
                    converted.attachments.push(PendingAttachments {
                        field_name: column.name.clone(),
                        files,
                    });
                }
                continue;
            }

            if let Some(value) = convert_value(column.source_kind, column.target_kind, value) {
                converted.fields.insert(column.name.clone(), value);
            }
        }

        converted
    }

    /// Convert a batch of records
    pub fn convert_all(&self, records: &[Record]) -> Vec<ConvertedRecord> {
        records.iter().map(|record| self.convert(record)).collect()
    }
}

fn attachment_refs(record_id: &str, field: &str, value: &JsonValue) -> Option<Vec<AttachmentRef>> {
    match serde_json::from_value::<Vec<AttachmentRef>>(value.clone()) {
        Ok(files) => {
            let files: Vec<_> = files
                .into_iter()
                .filter(|file| !file.file_token.is_empty())
                .collect();
            (!files.is_empty()).then_some(files)
        }
        Err(e) => {
            warn!(record_id, field, error = %e, "Unreadable attachment cell, skipping");
            None
        }
    }
}
