//! Auth types
//!
//! App credentials, cached app/tenant tokens and the per-session user token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// App credentials issued by the developer console
#[derive(Clone, PartialEq, Eq)]
pub struct AppCredentials {
    /// App id (`cli_...`)
    pub app_id: String,
    /// App secret
    pub app_secret: String,
}

impl AppCredentials {
    /// Create a new credentials pair
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"***")
            .finish()
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false,
        }
    }
}

/// Profile of the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub en_name: String,
    #[serde(default)]
    pub open_id: String,
    #[serde(default)]
    pub union_id: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// User access/refresh token pair obtained through OAuth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub refresh_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

impl UserToken {
    /// Whether the access token is still usable
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }

    /// Whether the refresh token can still be redeemed
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.refresh_expires_at.map_or(true, |at| at > Utc::now())
    }
}

/// Token payload inside the `data` envelope of the OIDC endpoints
#[derive(Debug, Deserialize)]
pub(crate) struct OidcTokenData {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
}

impl OidcTokenData {
    pub(crate) fn into_user_token(self, user: Option<UserInfo>) -> UserToken {
        let now = Utc::now();
        UserToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: now + chrono::Duration::seconds(self.expires_in),
            refresh_expires_at: self
                .refresh_expires_in
                .map(|secs| now + chrono::Duration::seconds(secs)),
            user,
        }
    }
}
