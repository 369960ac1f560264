//! Snapshot preview

use super::engine::SnapshotEngine;
use super::types::{BaseDescriptor, PreviewResult, TablePreview};
use crate::convert::field_kind;
use crate::error::Result;
use crate::lark::TableInfo;
use futures::future::join_all;
use tracing::{info, warn};

impl SnapshotEngine {
    /// Describe the tables a snapshot of `source_base_url` would copy
    ///
    /// Field lookups run concurrently; a table whose fields cannot be read reports zero.
    pub async fn preview(&self, source_base_url: &str) -> Result<PreviewResult> {
        let client = self.client();
        let resolved = client.resolve_base_url(source_base_url).await?;
        let source = client.get_app(&resolved.app_token).await?;
        let tables = client
            .list_tables_with_fallback(&resolved.app_token, resolved.table_id.as_deref())
            .await?;

        let previews = join_all(
            tables
                .into_iter()
                .map(|table| self.preview_table(&resolved.app_token, table)),
        )
        .await;

        info!(app_token = %resolved.app_token, tables = previews.len(), "Built preview");
        Ok(PreviewResult {
            source_base: BaseDescriptor::from(source),
            table_id_from_url: resolved.table_id,
            tables: previews,
        })
    }

    async fn preview_table(&self, app_token: &str, table: TableInfo) -> TablePreview {
        let (field_count, dynamic_field_count) =
            match self.client().list_fields(app_token, &table.table_id).await {
                Ok(fields) => (
                    fields.len(),
                    fields
                        .iter()
                        .filter(|f| field_kind(f).needs_conversion(false))
                        .count(),
                ),
                Err(e) => {
                    warn!(table_id = %table.table_id, error = %e, "Could not read fields for preview");
                    (0, 0)
                }
            };

        TablePreview {
            table_id: table.table_id,
            name: table.name,
            field_count,
            dynamic_field_count,
        }
    }
}
