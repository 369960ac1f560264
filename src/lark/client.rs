//! Typed client for the bitable, drive, wiki and authen endpoints
//!
//! Every call carries a bearer token: the caller's user token when one was
//! supplied through [`LarkClient::as_user`], otherwise the cached tenant token.

use super::base_url::{parse_base_url, BaseLocator};
use super::envelope::{body_error, read_body, read_data, read_data_within};
use super::types::{
    AppEnvelope, AppInfo, AttachmentRef, CreatedTable, FieldDef, Page, Permission, Record,
    TableInfo, UploadedMedia, WikiNode, WikiNodeEnvelope,
};
use crate::auth::{TokenProvider, UserInfo};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::{CursorPaginator, NextPage, PaginationState};
use crate::types::JsonObject;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for metadata and record calls
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for attachment downloads
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for attachment uploads
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
/// Maximum records accepted by one batch-create request
pub const RECORD_BATCH_SIZE: usize = 500;

/// A Base token resolved from a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBase {
    pub app_token: String,
    pub table_id: Option<String>,
}

/// Outcome of [`LarkClient::batch_create_records`]
#[derive(Debug)]
pub struct BatchWrite {
    /// Records written by the batches that succeeded
    pub written: usize,
    /// Error of the batch that stopped the insert
    pub error: Option<Error>,
}

impl BatchWrite {
    pub fn into_result(self) -> Result<usize> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.written),
        }
    }
}

/// Client for the vendor open API
#[derive(Clone)]
pub struct LarkClient {
    http: HttpClient,
    tokens: TokenProvider,
    user_token: Option<String>,
}

impl LarkClient {
    /// Create a client that authenticates with the tenant token
    pub fn new(http: HttpClient, tokens: TokenProvider) -> Self {
        Self {
            http,
            tokens,
            user_token: None,
        }
    }

    /// A copy of this client acting as the given user
    ///
    /// The tenant token cache stays shared.
    #[must_use]
    pub fn as_user(&self, user_token: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            tokens: self.tokens.clone(),
            user_token: Some(user_token.into()),
        }
    }

    /// Whether calls are made with a user token
    pub fn has_user_token(&self) -> bool {
        self.user_token.is_some()
    }

    /// The token provider backing this client
    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    async fn bearer(&self) -> Result<String> {
        match &self.user_token {
            Some(token) => Ok(token.clone()),
            None => self.tokens.tenant_token().await,
        }
    }

    async fn request_config(&self) -> Result<RequestConfig> {
        Ok(RequestConfig::new()
            .bearer(&self.bearer().await?)
            .timeout(METADATA_TIMEOUT))
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str, config: RequestConfig) -> Result<T> {
        read_data(self.http.get_with_config(path, config).await).await
    }

    async fn post_data<T: DeserializeOwned>(
        &self,
        path: &str,
        config: RequestConfig,
    ) -> Result<T> {
        read_data(self.http.post_with_config(path, config).await).await
    }

    // ========================================================================
    // URL resolution
    // ========================================================================

    /// Resolve a Base URL to its token, following Wiki indirection
    ///
    /// When the Wiki lookup fails or the node is not a Base, the direct URL
    /// patterns are used instead.
    pub async fn resolve_base_url(&self, url: &str) -> Result<ResolvedBase> {
        let BaseLocator {
            app_token,
            wiki_token,
            table_id,
        } = parse_base_url(url)?;

        if let Some(node_token) = wiki_token {
            match self.get_wiki_node(&node_token).await {
                Ok(node) if node.is_bitable() => {
                    info!(node = %node_token, app_token = %node.obj_token, "Resolved Wiki node to Base");
                    return Ok(ResolvedBase {
                        app_token: node.obj_token,
                        table_id,
                    });
                }
                Ok(node) => {
                    warn!(node = %node_token, obj_type = %node.obj_type, "Wiki node is not a Base");
                }
                Err(e) => {
                    warn!(node = %node_token, error = %e, "Wiki lookup failed, using URL patterns");
                }
            }
        }

        app_token
            .map(|app_token| ResolvedBase { app_token, table_id })
            .ok_or_else(|| Error::UnrecognizedBaseUrl {
                url: url.to_string(),
            })
    }

    /// Look up a Wiki node
    pub async fn get_wiki_node(&self, node_token: &str) -> Result<WikiNode> {
        let config = self
            .request_config()
            .await?
            .query("token", node_token)
            .query("obj_type", "wiki");
        let data: WikiNodeEnvelope = self.get_data("/wiki/v2/spaces/get_node", config).await?;
        Ok(data.node)
    }

    // ========================================================================
    // Bases
    // ========================================================================

    /// Fetch a Base descriptor
    pub async fn get_app(&self, app_token: &str) -> Result<AppInfo> {
        let config = self.request_config().await?;
        let data: AppEnvelope = self
            .get_data(&format!("/bitable/v1/apps/{app_token}"), config)
            .await?;
        Ok(data.app)
    }

    /// Create a new, empty Base
    pub async fn create_app(&self, name: &str, folder_token: Option<&str>) -> Result<AppInfo> {
        let mut body = json!({ "name": name });
        if let Some(folder) = folder_token {
            body["folder_token"] = json!(folder);
        }
        let config = self.request_config().await?.json(body).retries(0);
        let data: AppEnvelope = self.post_data("/bitable/v1/apps", config).await?;
        info!(app_token = %data.app.app_token, name, "Created Base");
        Ok(data.app)
    }

    /// Grant a user access to a Base
    pub async fn add_collaborator(
        &self,
        app_token: &str,
        open_id: &str,
        permission: Permission,
    ) -> Result<()> {
        let config = self
            .request_config()
            .await?
            .query("type", "bitable")
            .query("need_notification", "false")
            .json(json!({
                "member_type": "openid",
                "member_id": open_id,
                "perm": permission,
            }));
        read_body(
            self.http
                .post_with_config(&format!("/drive/v1/permissions/{app_token}/members"), config)
                .await,
        )
        .await?;
        Ok(())
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// List all tables of a Base
    pub async fn list_tables(&self, app_token: &str) -> Result<Vec<TableInfo>> {
        self.list_paged(
            &format!("/bitable/v1/apps/{app_token}/tables"),
            &CursorPaginator::tables(),
        )
        .await
    }

    /// List tables, degrading on permission errors
    ///
    /// A caller without table-list access still gets the table named in the URL.
    pub async fn list_tables_with_fallback(
        &self,
        app_token: &str,
        url_table_id: Option<&str>,
    ) -> Result<Vec<TableInfo>> {
        match self.list_tables(app_token).await {
            Err(e) if e.is_permission_denied() => {
                warn!(app_token, error = %e, "No permission to list tables, using table from URL");
                Ok(url_table_id
                    .map(|id| {
                        vec![TableInfo {
                            table_id: id.to_string(),
                            name: id.to_string(),
                        }]
                    })
                    .unwrap_or_default())
            }
            other => other,
        }
    }

    /// Create a table with the given fields; returns the new table id
    pub async fn create_table(
        &self,
        app_token: &str,
        name: &str,
        fields: &[FieldDef],
    ) -> Result<String> {
        let config = self
            .request_config()
            .await?
            .json(json!({ "table": { "name": name, "fields": fields } }))
            .retries(0);
        let data: CreatedTable = self
            .post_data(&format!("/bitable/v1/apps/{app_token}/tables"), config)
            .await?;
        info!(app_token, table_id = %data.table_id, name, fields = fields.len(), "Created table");
        Ok(data.table_id)
    }

    /// Delete a table
    pub async fn delete_table(&self, app_token: &str, table_id: &str) -> Result<()> {
        let config = self.request_config().await?;
        read_body(
            self.http
                .request(
                    reqwest::Method::DELETE,
                    &format!("/bitable/v1/apps/{app_token}/tables/{table_id}"),
                    config,
                )
                .await,
        )
        .await?;
        Ok(())
    }

    // ========================================================================
    // Fields
    // ========================================================================

    /// List the field definitions of a table
    pub async fn list_fields(&self, app_token: &str, table_id: &str) -> Result<Vec<FieldDef>> {
        self.list_paged(
            &format!("/bitable/v1/apps/{app_token}/tables/{table_id}/fields"),
            &CursorPaginator::fields(),
        )
        .await
    }

    /// List fields, returning nothing on permission errors
    pub async fn list_fields_with_fallback(
        &self,
        app_token: &str,
        table_id: &str,
    ) -> Result<Vec<FieldDef>> {
        match self.list_fields(app_token, table_id).await {
            Err(e) if e.is_permission_denied() => {
                warn!(app_token, table_id, error = %e, "No permission to list fields");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// List all records of a table
    pub async fn list_records(&self, app_token: &str, table_id: &str) -> Result<Vec<Record>> {
        self.list_paged(
            &format!("/bitable/v1/apps/{app_token}/tables/{table_id}/records"),
            &CursorPaginator::records(),
        )
        .await
    }

    /// List records, returning nothing on permission errors
    pub async fn list_records_with_fallback(
        &self,
        app_token: &str,
        table_id: &str,
    ) -> Result<Vec<Record>> {
        match self.list_records(app_token, table_id).await {
            Err(e) if e.is_permission_denied() => {
                warn!(app_token, table_id, error = %e, "No permission to list records");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Insert records in batches of [`RECORD_BATCH_SIZE`]
    ///
    /// Stops at the first failing batch; earlier batches stay written and are counted.
    pub async fn batch_create_records(
        &self,
        app_token: &str,
        table_id: &str,
        records: &[JsonObject],
    ) -> BatchWrite {
        let path = format!("/bitable/v1/apps/{app_token}/tables/{table_id}/records/batch_create");
        let mut written = 0;

        for chunk in records.chunks(RECORD_BATCH_SIZE) {
            if let Err(e) = self.create_batch(&path, chunk).await {
                warn!(table_id, written, total = records.len(), error = %e, "Record batch failed");
                return BatchWrite {
                    written,
                    error: Some(e),
                };
            }
            written += chunk.len();
            debug!(table_id, written, total = records.len(), "Wrote record batch");
        }

        BatchWrite {
            written,
            error: None,
        }
    }

    async fn create_batch(&self, path: &str, chunk: &[JsonObject]) -> Result<()> {
        let body = json!({
            "records": chunk.iter().map(|fields| json!({ "fields": fields })).collect::<Vec<_>>()
        });
        let config = self.request_config().await?.json(body).retries(0);
        read_body(self.http.post_with_config(path, config).await).await?;
        Ok(())
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Profile of the user behind the current user token
    pub async fn current_user(&self) -> Result<UserInfo> {
        if self.user_token.is_none() {
            return Err(Error::Unauthenticated);
        }
        let config = self.request_config().await?;
        self.get_data("/authen/v1/user_info", config).await
    }

    // ========================================================================
    // Attachments
    // ========================================================================

    /// Download an attachment's bytes
    pub async fn download_media(&self, file_token: &str) -> Result<Bytes> {
        let config = self.request_config().await?.timeout(DOWNLOAD_TIMEOUT);
        let response = self
            .http
            .get_with_config(&format!("/drive/v1/medias/{file_token}/download"), config)
            .await
            .map_err(super::envelope::api_error_from_status)?;
        response
            .bytes()
            .await
            .map_err(|e| body_error(e, DOWNLOAD_TIMEOUT))
    }

    /// Upload a file into a Base; returns the new file token
    pub async fn upload_media(
        &self,
        app_token: &str,
        attachment: &AttachmentRef,
        content: Bytes,
    ) -> Result<String> {
        let size = content.len();
        let mut part = Part::bytes(content.to_vec()).file_name(attachment.name.clone());
        if let Some(mime) = attachment.mime_type.as_deref() {
            part = part.mime_str(mime)?;
        }
        let form = Form::new()
            .text("file_name", attachment.name.clone())
            .text("parent_type", "bitable_file")
            .text("parent_node", app_token.to_string())
            .text("size", size.to_string())
            .part("file", part);

        let config = RequestConfig::new()
            .bearer(&self.bearer().await?)
            .timeout(UPLOAD_TIMEOUT);
        let data: UploadedMedia = read_data_within(
            self.http
                .post_multipart("/drive/v1/medias/upload_all", form, config)
                .await,
            UPLOAD_TIMEOUT,
        )
        .await?;
        Ok(data.file_token)
    }

    // ========================================================================
    // Pagination
    // ========================================================================

    async fn list_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        paginator: &CursorPaginator,
    ) -> Result<Vec<T>> {
        let base_config = self.request_config().await?;
        let mut state = PaginationState::new();
        let mut items = Vec::new();

        loop {
            let mut config = base_config.clone();
            for (key, value) in paginator.params(&state) {
                config = config.query(key, value);
            }

            let page: Page<T> = self.get_data(path, config).await?;
            let batch = page.items.unwrap_or_default();
            let count = batch.len();
            items.extend(batch);

            let next =
                paginator.process_page(page.has_more, page.page_token.as_deref(), count, &mut state);
            if let NextPage::Done(reason) = next {
                debug!(path, pages = state.page, items = items.len(), ?reason, "Listing finished");
                break;
            }
        }

        Ok(items)
    }
}

impl std::fmt::Debug for LarkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LarkClient")
            .field("http", &self.http)
            .field("user_token", &self.user_token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}
