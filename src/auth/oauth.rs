//! OAuth2 authorization-code flow against the Lark OIDC endpoints
//!
//! Code redemption and refresh both go through the same two-step chain: an app
//! access token is obtained first and used as the bearer for the OIDC call.

use super::tenant::TokenProvider;
use super::types::{OidcTokenData, UserInfo, UserToken};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::lark::envelope::read_data;
use serde_json::json;
use tracing::info;
use url::Url;

/// Scopes requested at sign-in
pub const OAUTH_SCOPES: &[&str] = &[
    "bitable:app",
    "drive:drive",
    "wiki:wiki:readonly",
    "contact:user.base:readonly",
    "offline_access",
];

const AUTHORIZE_PATH: &str = "authen/v1/authorize";
const ACCESS_TOKEN_PATH: &str = "/authen/v1/oidc/access_token";
const REFRESH_TOKEN_PATH: &str = "/authen/v1/oidc/refresh_access_token";

/// Builds authorization URLs and redeems/refreshes user tokens
#[derive(Debug, Clone)]
pub struct OAuthService {
    tokens: TokenProvider,
    http: HttpClient,
    auth_base: String,
    redirect_uri: String,
}

impl OAuthService {
    /// Create a new OAuth service
    ///
    /// `auth_base` is the root the authorization page lives under, e.g.
    /// `https://open.larksuite.com/open-apis`. OIDC calls go through `http`.
    pub fn new(
        tokens: TokenProvider,
        http: HttpClient,
        auth_base: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            http,
            auth_base: auth_base.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Authorization URL the browser is redirected to
    pub fn authorization_url(&self, state: &str) -> Result<Url> {
        let base = format!("{}/", self.auth_base.trim_end_matches('/'));
        let mut url = Url::parse(&base)?.join(AUTHORIZE_PATH)?;
        url.query_pairs_mut()
            .append_pair("app_id", self.tokens.app_id())
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &OAUTH_SCOPES.join(" "))
            .append_pair("state", state);
        Ok(url)
    }

    /// Redeem an authorization code for a user token pair
    pub async fn exchange_code(&self, code: &str) -> Result<UserToken> {
        if code.is_empty() {
            return Err(Error::OAuth2 {
                message: "authorization code is empty".to_string(),
            });
        }

        let data: OidcTokenData = self
            .oidc_call(
                ACCESS_TOKEN_PATH,
                json!({ "grant_type": "authorization_code", "code": code }),
            )
            .await
            .map_err(|e| Error::OAuth2 {
                message: format!("code exchange failed: {e}"),
            })?;

        info!("Exchanged authorization code for user token");
        Ok(data.into_user_token(None))
    }

    /// Refresh a user token, keeping the attached profile
    pub async fn refresh(&self, token: &UserToken) -> Result<UserToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .filter(|_| token.can_refresh())
            .ok_or_else(|| Error::TokenRefresh {
                message: "no usable refresh token".to_string(),
            })?;

        let data: OidcTokenData = self
            .oidc_call(
                REFRESH_TOKEN_PATH,
                json!({ "grant_type": "refresh_token", "refresh_token": refresh_token }),
            )
            .await
            .map_err(|e| Error::TokenRefresh {
                message: e.to_string(),
            })?;

        info!("Refreshed user token");
        Ok(data.into_user_token(token.user.clone()))
    }

    /// Attach a profile to a freshly issued token
    pub fn with_user(token: UserToken, user: UserInfo) -> UserToken {
        UserToken {
            user: Some(user),
            ..token
        }
    }

    async fn oidc_call(&self, path: &str, body: serde_json::Value) -> Result<OidcTokenData> {
        let app_token = self.tokens.app_token().await?;
        read_data(
            self.http
                .post_with_config(
                    path,
                    RequestConfig::new().bearer(&app_token).json(body).retries(0),
                )
                .await,
        )
        .await
    }
}
