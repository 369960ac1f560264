//! Browser sessions
//!
//! A session is identified by an opaque id cookie. Its token lives either in a
//! [`TokenStore`] keyed by that id, or (cookie backend) in a second cookie carrying the
//! encoded token itself.

use super::oauth::OAuthService;
use super::store::{decode_cookie_token, encode_cookie_token, TokenStore};
use super::types::UserToken;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where session tokens are kept
#[derive(Clone)]
pub enum SessionBackend {
    /// Server-side store keyed by session id
    Store(Arc<dyn TokenStore>),
    /// The token travels in a cookie
    Cookie,
}

impl SessionBackend {
    /// Server-side backend over any store
    pub fn store(store: impl TokenStore + 'static) -> Self {
        Self::Store(Arc::new(store))
    }

    pub fn is_cookie(&self) -> bool {
        matches!(self, Self::Cookie)
    }
}

impl std::fmt::Debug for SessionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(_) => f.write_str("SessionBackend::Store"),
            Self::Cookie => f.write_str("SessionBackend::Cookie"),
        }
    }
}

/// Result of looking up a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSession {
    /// A token valid right now, if the session has one
    pub token: Option<UserToken>,
    /// New cookie payload when a refreshed token must be sent back (cookie backend)
    pub updated_cookie: Option<String>,
}

impl ResolvedSession {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Looks up, refreshes, saves and clears session tokens
#[derive(Debug, Clone)]
pub struct SessionManager {
    backend: SessionBackend,
    oauth: OAuthService,
}

impl SessionManager {
    pub fn new(backend: SessionBackend, oauth: OAuthService) -> Self {
        Self { backend, oauth }
    }

    pub fn oauth(&self) -> &OAuthService {
        &self.oauth
    }

    pub fn backend(&self) -> &SessionBackend {
        &self.backend
    }

    /// Find the session's token, refreshing it when expired
    ///
    /// `cookie_payload` is only read by the cookie backend. A token that is expired
    /// and cannot be refreshed resolves to no token.
    pub async fn resolve(
        &self,
        session_id: Option<&str>,
        cookie_payload: Option<&str>,
    ) -> Result<ResolvedSession> {
        let token = match (&self.backend, session_id) {
            (SessionBackend::Store(store), Some(id)) => store.get(id).await?,
            (SessionBackend::Store(_), None) => None,
            (SessionBackend::Cookie, _) => cookie_payload.and_then(decode_cookie_token),
        };

        let Some(token) = token else {
            return Ok(ResolvedSession::default());
        };
        if token.is_valid() {
            return Ok(ResolvedSession {
                token: Some(token),
                updated_cookie: None,
            });
        }
        if !token.can_refresh() {
            debug!("Session token expired and cannot be refreshed");
            return Ok(ResolvedSession::default());
        }

        match self.oauth.refresh(&token).await {
            Ok(refreshed) => {
                debug!("Refreshed expired session token");
                let updated_cookie = self.save(session_id, refreshed.clone()).await?;
                Ok(ResolvedSession {
                    token: Some(refreshed),
                    updated_cookie,
                })
            }
            Err(e) => {
                warn!(error = %e, "Session token refresh failed");
                Ok(ResolvedSession::default())
            }
        }
    }

    /// Persist a token; returns the cookie payload to set for the cookie backend
    pub async fn save(&self, session_id: Option<&str>, token: UserToken) -> Result<Option<String>> {
        match &self.backend {
            SessionBackend::Store(store) => {
                let id = session_id.ok_or_else(|| Error::store("missing session id"))?;
                store.put(id, token).await?;
                Ok(None)
            }
            SessionBackend::Cookie => encode_cookie_token(&token).map(Some),
        }
    }

    /// Forget a session's token
    pub async fn clear(&self, session_id: Option<&str>) -> Result<()> {
        if let (SessionBackend::Store(store), Some(id)) = (&self.backend, session_id) {
            store.remove(id).await?;
        }
        Ok(())
    }
}
