//! Session token storage
//!
//! Tokens are keyed by an opaque session id. The in-memory store lives for the
//! process lifetime; the file store additionally writes every mutation to a JSON
//! file with an atomic rename. Managed runtimes keep no server-side state and carry
//! the token in a cookie instead (see [`encode_cookie_token`]).

use super::types::UserToken;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keyed storage for user tokens
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Look up the token for a session
    async fn get(&self, session_id: &str) -> Result<Option<UserToken>>;

    /// Insert or replace the token for a session
    async fn put(&self, session_id: &str, token: UserToken) -> Result<()>;

    /// Forget a session
    async fn remove(&self, session_id: &str) -> Result<()>;
}

/// Process-lifetime token store
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<RwLock<HashMap<String, UserToken>>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Whether the store holds no sessions
    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, session_id: &str) -> Result<Option<UserToken>> {
        Ok(self.tokens.read().await.get(session_id).cloned())
    }

    async fn put(&self, session_id: &str, token: UserToken) -> Result<()> {
        self.tokens
            .write()
            .await
            .insert(session_id.to_string(), token);
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<()> {
        self.tokens.write().await.remove(session_id);
        Ok(())
    }
}

/// Token store persisted to a local JSON file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    tokens: Arc<RwLock<HashMap<String, UserToken>>>,
}

impl FileTokenStore {
    /// Open a store, loading existing sessions if the file is present
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tokens = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::store(format!("Failed to read session file: {e}")))?;
            if contents.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&contents)
                    .map_err(|e| Error::store(format!("Failed to parse session file: {e}")))?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            tokens: Arc::new(RwLock::new(tokens)),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, tokens: &HashMap<String, UserToken>) -> Result<()> {
        let contents = serde_json::to_string_pretty(tokens)
            .map_err(|e| Error::store(format!("Failed to serialize sessions: {e}")))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::store(format!("Failed to write session file: {e}")))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::store(format!("Failed to rename session file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, session_id: &str) -> Result<Option<UserToken>> {
        Ok(self.tokens.read().await.get(session_id).cloned())
    }

    async fn put(&self, session_id: &str, token: UserToken) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        tokens.insert(session_id.to_string(), token);
        self.save(&tokens).await
    }

    async fn remove(&self, session_id: &str) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        if tokens.remove(session_id).is_some() {
            self.save(&tokens).await?;
        }
        Ok(())
    }
}

/// Encode a token as a cookie-safe base64 payload
pub fn encode_cookie_token(token: &UserToken) -> Result<String> {
    let json = serde_json::to_vec(token)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a cookie payload; malformed payloads read as absent
pub fn decode_cookie_token(payload: &str) -> Option<UserToken> {
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}
