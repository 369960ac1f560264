//! Snapshot procedure

use super::types::{BaseDescriptor, SnapshotConfig, SnapshotError, SnapshotResult};
use crate::convert::{convert_fields, ConvertedField, ConvertedRecord, RecordConverter};
use crate::error::{Error, Result};
use crate::lark::{AppInfo, AttachmentRef, FieldDef, LarkClient, Permission, TableInfo};
use crate::types::{JsonObject, JsonValue};
use chrono::{NaiveDate, Utc};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Names the vendor gives the table it adds to every new Base
pub const DEFAULT_TABLE_NAMES: &[&str] = &[
    "Table",
    "Table1",
    "Table 1",
    "数据表",
    "数据表1",
    "表格",
    "表格1",
    "テーブル",
    "テーブル1",
];

/// Format of the date suffix appended to copied table names
pub const TABLE_SUFFIX_FORMAT: &str = "%Y%m%d";

/// Source and target of a snapshot once setup succeeded
struct Setup {
    source_token: String,
    source: AppInfo,
    target: AppInfo,
    url_table_id: Option<String>,
}

/// Copies a Base into a new static Base
#[derive(Debug, Clone)]
pub struct SnapshotEngine {
    client: LarkClient,
    date: Option<NaiveDate>,
}

impl SnapshotEngine {
    /// Create an engine using the given client's credentials
    pub fn new(client: LarkClient) -> Self {
        Self { client, date: None }
    }

    /// Fix the date used for table name suffixes (defaults to today, UTC)
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Get the client
    pub fn client(&self) -> &LarkClient {
        &self.client
    }

    /// Name of a copied table
    pub fn target_table_name(&self, source_name: &str) -> String {
        let date = self.date.unwrap_or_else(|| Utc::now().date_naive());
        format!("{source_name}_{}", date.format(TABLE_SUFFIX_FORMAT))
    }

    /// Run a snapshot; failures are reported in the result, never returned
    pub async fn run(&self, config: &SnapshotConfig) -> SnapshotResult {
        let start = Instant::now();
        info!(source = %config.source_base_url, target = %config.target_base_name, "Starting snapshot");

        let setup = match self.setup(config).await {
            Ok(setup) => setup,
            Err(e) => {
                error!(error = %e, "Snapshot setup failed");
                return SnapshotResult::failed(e.to_string());
            }
        };

        let mut result = SnapshotResult::started(
            BaseDescriptor::from(setup.source.clone()),
            BaseDescriptor::from(setup.target.clone()),
        );
        let target_token = setup.target.app_token.clone();

        let undeleted_default = self.delete_default_table(&setup.target).await;

        let tables = match self
            .client
            .list_tables_with_fallback(&setup.source_token, setup.url_table_id.as_deref())
            .await
        {
            Ok(tables) => tables,
            Err(e) => {
                result.add_error(SnapshotError::general(format!("Failed to list tables: {e}")));
                Vec::new()
            }
        };
        let tables: Vec<TableInfo> = tables
            .into_iter()
            .filter(|table| config.includes_table(&table.table_id))
            .collect();

        if tables.is_empty() {
            warn!(source = %setup.source_token, "No tables to copy");
            result.add_error(SnapshotError::general("No tables found to copy"));
        }

        for table in &tables {
            let target_name = self.target_table_name(&table.name);
            match self
                .copy_table(&setup.source_token, &target_token, table, &target_name, config, &mut result)
                .await
            {
                Ok(records) => {
                    info!(table = %table.name, target = %target_name, records, "Copied table");
                    result.add_table();
                }
                Err(e) => {
                    warn!(table = %table.name, error = %e, "Failed to copy table");
                    result.add_error(SnapshotError::table(&table.name, e.to_string()));
                }
            }
        }

        if let Some(table_id) = undeleted_default {
            if result.tables_processed > 0 {
                match self.client.delete_table(&target_token, &table_id).await {
                    Ok(()) => debug!(table_id = %table_id, "Deleted default table after copy"),
                    Err(e) => warn!(table_id = %table_id, error = %e, "Default table could not be deleted"),
                }
            }
        }

        if config.grant_admin_permission {
            if let Err(e) = self.grant_admin(&target_token).await {
                warn!(error = %e, "Failed to grant admin permission");
                result.add_error(SnapshotError::general(format!(
                    "Failed to grant admin permission: {e}"
                )));
            }
        }

        info!(
            target = %target_token,
            tables = result.tables_processed,
            records = result.records_processed,
            fields_converted = result.fields_converted,
            errors = result.errors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Snapshot finished"
        );
        result
    }

    async fn setup(&self, config: &SnapshotConfig) -> Result<Setup> {
        let resolved = self.client.resolve_base_url(&config.source_base_url).await?;
        let source = self.client.get_app(&resolved.app_token).await?;
        let target = self
            .client
            .create_app(&config.target_base_name, None)
            .await?;

        Ok(Setup {
            source_token: resolved.app_token,
            source,
            target,
            url_table_id: resolved.table_id,
        })
    }

    /// Delete the table a new Base starts with; returns its id if it is still there
    async fn delete_default_table(&self, target: &AppInfo) -> Option<String> {
        let table_id = match &target.default_table_id {
            Some(id) => id.clone(),
            None => {
                let tables = match self.client.list_tables(&target.app_token).await {
                    Ok(tables) => tables,
                    Err(e) => {
                        warn!(error = %e, "Could not list tables of the new Base");
                        return None;
                    }
                };
                tables
                    .into_iter()
                    .find(|t| DEFAULT_TABLE_NAMES.contains(&t.name.as_str()))?
                    .table_id
            }
        };

        match self.client.delete_table(&target.app_token, &table_id).await {
            Ok(()) => {
                debug!(table_id = %table_id, "Deleted default table");
                None
            }
            Err(e) => {
                debug!(table_id = %table_id, error = %e, "Default table not deleted yet, retrying after copy");
                Some(table_id)
            }
        }
    }

    /// Replicate one table; returns the number of records written
    async fn copy_table(
        &self,
        source_token: &str,
        target_token: &str,
        table: &TableInfo,
        target_name: &str,
        config: &SnapshotConfig,
        result: &mut SnapshotResult,
    ) -> Result<usize> {
        let source_fields = self
            .client
            .list_fields_with_fallback(source_token, &table.table_id)
            .await?;
        if source_fields.is_empty() {
            return Err(Error::Other("No fields found in table".to_string()));
        }

        let converted = convert_fields(&source_fields, config.preserve_attachments);
        let converted_count = converted.iter().filter(|f| f.is_converted()).count();
        let definitions: Vec<FieldDef> = converted.iter().map(|f| f.definition.clone()).collect();

        let target_table = self
            .client
            .create_table(target_token, target_name, &definitions)
            .await?;
        result.add_converted_fields(converted_count);

        let target_names = self.target_field_names(target_token, &target_table, &converted).await;
        let converter = RecordConverter::new(&converted, target_names.iter().map(String::as_str));
        for skipped in converter.skipped_fields() {
            warn!(table = %table.name, field = %skipped, "Field missing from target table, skipping");
        }

        let records = self
            .client
            .list_records_with_fallback(source_token, &table.table_id)
            .await?;
        let mut rows = converter.convert_all(&records);

        if config.preserve_attachments {
            for row in &mut rows {
                self.transfer_attachments(target_token, &table.name, row, result)
                    .await;
            }
        }

        let payload: Vec<JsonObject> = rows.into_iter().map(|row| row.fields).collect();
        let batch = self
            .client
            .batch_create_records(target_token, &target_table, &payload)
            .await;
        result.add_records(batch.written);
        batch.into_result()
    }

    /// Field names accepted by the new table
    ///
    /// The vendor may rename fields on create, so the table is re-read; if that fails the
    /// requested names are assumed.
    async fn target_field_names(
        &self,
        target_token: &str,
        table_id: &str,
        requested: &[ConvertedField],
    ) -> Vec<String> {
        match self.client.list_fields(target_token, table_id).await {
            Ok(fields) => fields.into_iter().map(|f| f.field_name).collect(),
            Err(e) => {
                warn!(table_id, error = %e, "Could not re-read target fields, assuming requested names");
                requested
                    .iter()
                    .map(|f| f.definition.field_name.clone())
                    .collect()
            }
        }
    }

    /// Copy a record's attachment files and point its cells at the new tokens
    ///
    /// Files that fail are dropped from the cell and reported.
    async fn transfer_attachments(
        &self,
        target_token: &str,
        table_name: &str,
        row: &mut ConvertedRecord,
        result: &mut SnapshotResult,
    ) {
        for pending in std::mem::take(&mut row.attachments) {
            let mut tokens = Vec::with_capacity(pending.files.len());
            for file in &pending.files {
                match self.copy_attachment(target_token, file).await {
                    Ok(token) => tokens.push(json!({ "file_token": token })),
                    Err(e) => {
                        warn!(record = %row.record_id, file = %file.name, error = %e, "Attachment copy failed");
                        result.add_error(SnapshotError::cell(
                            table_name,
                            &row.record_id,
                            &pending.field_name,
                            format!("Failed to copy attachment {}: {e}", file.name),
                        ));
                    }
                }
            }
            if !tokens.is_empty() {
                row.fields
                    .insert(pending.field_name, JsonValue::Array(tokens));
            }
        }
    }

    async fn copy_attachment(&self, target_token: &str, file: &AttachmentRef) -> Result<String> {
        let content = self.client.download_media(&file.file_token).await?;
        self.client.upload_media(target_token, file, content).await
    }

    async fn grant_admin(&self, target_token: &str) -> Result<()> {
        let user = self.client.current_user().await?;
        if user.open_id.is_empty() {
            return Err(Error::auth("signed-in user has no open_id"));
        }
        self.client
            .add_collaborator(target_token, &user.open_id, Permission::FullAccess)
            .await?;
        info!(target = target_token, user = %user.name, "Granted full access");
        Ok(())
    }
}
