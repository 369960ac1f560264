//! App and tenant token provider
//!
//! Both tokens are obtained from the app credentials and cached until shortly
//! before expiry. Clones share the cache.

use super::types::{AppCredentials, CachedToken};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::lark::envelope::read_body;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const TENANT_TOKEN_PATH: &str = "/auth/v3/tenant_access_token/internal";
const APP_TOKEN_PATH: &str = "/auth/v3/app_access_token/internal";

/// Which self-built-app token to request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Tenant,
    App,
}

impl TokenKind {
    fn path(self) -> &'static str {
        match self {
            Self::Tenant => TENANT_TOKEN_PATH,
            Self::App => APP_TOKEN_PATH,
        }
    }
}

/// Token endpoint response (these endpoints are not wrapped in `data`)
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    tenant_access_token: Option<String>,
    #[serde(default)]
    app_access_token: Option<String>,
    #[serde(default)]
    expire: Option<i64>,
}

impl TokenResponse {
    fn into_cached_token(self, kind: TokenKind) -> Result<CachedToken> {
        let token = match kind {
            TokenKind::Tenant => self.tenant_access_token,
            TokenKind::App => self.app_access_token,
        }
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::auth("token missing from token endpoint response"))?;

        Ok(match self.expire {
            Some(secs) => CachedToken::expires_in(token, secs),
            None => CachedToken::new(token, None),
        })
    }
}

/// Issues tenant-level and app-level access tokens
#[derive(Clone)]
pub struct TokenProvider {
    credentials: AppCredentials,
    http: HttpClient,
    tenant_token: Arc<RwLock<Option<CachedToken>>>,
    app_token: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenProvider {
    /// Create a new token provider
    pub fn new(credentials: AppCredentials, http: HttpClient) -> Self {
        Self {
            credentials,
            http,
            tenant_token: Arc::new(RwLock::new(None)),
            app_token: Arc::new(RwLock::new(None)),
        }
    }

    /// The app id these tokens are issued for
    pub fn app_id(&self) -> &str {
        &self.credentials.app_id
    }

    /// Get a valid tenant access token, refreshing if necessary
    pub async fn tenant_token(&self) -> Result<String> {
        self.get_or_refresh(TokenKind::Tenant).await
    }

    /// Get a valid app access token, refreshing if necessary
    pub async fn app_token(&self) -> Result<String> {
        self.get_or_refresh(TokenKind::App).await
    }

    /// Clear both cached tokens
    pub async fn clear_cache(&self) {
        *self.tenant_token.write().await = None;
        *self.app_token.write().await = None;
    }

    fn slot(&self, kind: TokenKind) -> &Arc<RwLock<Option<CachedToken>>> {
        match kind {
            TokenKind::Tenant => &self.tenant_token,
            TokenKind::App => &self.app_token,
        }
    }

    async fn get_or_refresh(&self, kind: TokenKind) -> Result<String> {
        let slot = self.slot(kind);
        {
            let cached = slot.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = slot.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let new_token = self.fetch(kind).await?;
        let token_str = new_token.token.clone();
        *cached = Some(new_token);

        Ok(token_str)
    }

    async fn fetch(&self, kind: TokenKind) -> Result<CachedToken> {
        debug!(?kind, "Fetching access token");
        let body = read_body(
            self.http
                .post_with_config(
                    kind.path(),
                    RequestConfig::new().json(json!({
                        "app_id": self.credentials.app_id,
                        "app_secret": self.credentials.app_secret,
                    })),
                )
                .await,
        )
        .await
        .map_err(|e| Error::auth(format!("token request failed: {e}")))?;

        let response: TokenResponse = serde_json::from_value(body)?;
        response.into_cached_token(kind)
    }
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("app_id", &self.credentials.app_id)
            .finish_non_exhaustive()
    }
}
