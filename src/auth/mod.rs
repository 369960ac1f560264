//! Authentication module
//!
//! - `TokenProvider` caches the tenant and app access tokens derived from the
//!   app credentials.
//! - `OAuthService` runs the authorization-code flow and refreshes user tokens.
//! - `TokenStore` implementations keep user tokens per browser session.
//! - `SessionManager` resolves a browser session to a valid user token.

mod oauth;
mod session;
mod store;
mod tenant;
mod types;

pub use oauth::{OAuthService, OAUTH_SCOPES};
pub use session::{ResolvedSession, SessionBackend, SessionManager};
pub use store::{
    decode_cookie_token, encode_cookie_token, FileTokenStore, MemoryTokenStore, TokenStore,
};
pub use tenant::TokenProvider;
pub use types::{AppCredentials, CachedToken, UserInfo, UserToken};

#[cfg(test)]
mod tests;
