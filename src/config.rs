//! Application configuration
//!
//! Values come from CLI flags or the environment (see `cli::commands`); this module
//! holds the resolved settings and their defaults.

use crate::auth::{AppCredentials, OAuthService, TokenProvider};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig};
use crate::lark::LarkClient;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Default open-apis root
pub const DEFAULT_API_BASE: &str = "https://open.larksuite.com/open-apis";
/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3001;
/// Default session file in file mode
pub const DEFAULT_SESSION_FILE: &str = ".sessions.json";
/// Default UI origin
pub const DEFAULT_CLIENT_URL: &str = "http://localhost:5173";
/// Default OAuth redirect URI
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3001/api/auth/callback";

/// Environment variables that mark a managed (serverless) runtime
const MANAGED_RUNTIME_VARS: &[&str] = &["VERCEL", "AWS_LAMBDA_FUNCTION_NAME"];

// ============================================================================
// Vendor app
// ============================================================================

/// Credentials and endpoints of the vendor app
#[derive(Clone, Serialize, Deserialize)]
pub struct LarkConfig {
    pub app_id: String,
    pub app_secret: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Root of the authorization page; defaults to `api_base`
    #[serde(default)]
    pub auth_base: Option<String>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl LarkConfig {
    /// Create a config against the default endpoints
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            api_base: default_api_base(),
            auth_base: None,
        }
    }

    /// Fail if a required value is missing
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(Error::missing_field("LARK_APP_ID"));
        }
        if self.app_secret.trim().is_empty() {
            return Err(Error::missing_field("LARK_APP_SECRET"));
        }
        url::Url::parse(&self.api_base)
            .map_err(|e| Error::config(format!("invalid API base '{}': {e}", self.api_base)))?;
        Ok(())
    }

    /// Root of the authorization page
    pub fn auth_base(&self) -> &str {
        self.auth_base.as_deref().unwrap_or(&self.api_base)
    }

    pub fn credentials(&self) -> AppCredentials {
        AppCredentials::new(&self.app_id, &self.app_secret)
    }

    /// HTTP client rooted at the API base
    pub fn http_client(&self) -> HttpClient {
        HttpClient::with_config(
            HttpClientConfig::builder()
                .base_url(self.api_base.trim_end_matches('/'))
                .build(),
        )
    }

    /// Build the tenant-authenticated client and the OAuth service, sharing one token cache
    pub fn build_clients(&self, redirect_uri: &str) -> (LarkClient, OAuthService) {
        let http = self.http_client();
        let tokens = TokenProvider::new(self.credentials(), http.clone());
        let oauth = OAuthService::new(tokens.clone(), http.clone(), self.auth_base(), redirect_uri);
        (LarkClient::new(http, tokens), oauth)
    }
}

impl std::fmt::Debug for LarkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LarkConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"***")
            .field("api_base", &self.api_base)
            .field("auth_base", &self.auth_base)
            .finish()
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Where user sessions are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// In-process map, lost on restart
    Memory,
    /// JSON file keyed by session id
    File,
    /// Token carried in a cookie, for managed runtimes without local state
    Cookie,
}

impl SessionMode {
    /// Cookie mode under a managed runtime, file mode otherwise
    pub fn detect() -> Self {
        Self::detect_from(|name| std::env::var_os(name).is_some_and(|v| !v.is_empty()))
    }

    /// Detection against an arbitrary environment lookup
    pub fn detect_from(is_set: impl Fn(&str) -> bool) -> Self {
        if MANAGED_RUNTIME_VARS.iter().any(|name| is_set(name)) {
            Self::Cookie
        } else {
            Self::File
        }
    }
}

impl FromStr for SessionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "cookie" => Ok(Self::Cookie),
            other => Err(Error::config(format!("unknown session mode '{other}'"))),
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File => write!(f, "file"),
            Self::Cookie => write!(f, "cookie"),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// Settings of the HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub lark: LarkConfig,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Origin of the UI, allowed by CORS and used for post-login redirects
    #[serde(default = "default_client_url")]
    pub client_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "SessionMode::detect")]
    pub session_mode: SessionMode,
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

fn default_client_url() -> String {
    DEFAULT_CLIENT_URL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_session_file() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_FILE)
}

impl ServerConfig {
    /// Server settings with defaults for everything but the vendor app
    pub fn new(lark: LarkConfig) -> Self {
        Self {
            lark,
            redirect_uri: default_redirect_uri(),
            client_url: default_client_url(),
            port: default_port(),
            session_mode: SessionMode::detect(),
            session_file: default_session_file(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.lark.validate()?;
        url::Url::parse(&self.redirect_uri).map_err(|e| {
            Error::config(format!("invalid redirect URI '{}': {e}", self.redirect_uri))
        })?;
        url::Url::parse(&self.client_url)
            .map_err(|e| Error::config(format!("invalid client URL '{}': {e}", self.client_url)))?;
        Ok(())
    }

    /// Whether cookies must carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.client_url.starts_with("https://")
    }
}
