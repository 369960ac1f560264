//! Tests for the auth module

use super::*;
use crate::error::Error;
use crate::http::{HttpClient, HttpClientConfig};
use chrono::Utc;
use tempfile::tempdir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_for(server: &MockServer) -> HttpClient {
    HttpClient::with_config(
        HttpClientConfig::builder()
            .base_url(server.uri())
            .no_rate_limit()
            .build(),
    )
}

fn provider_for(server: &MockServer) -> TokenProvider {
    TokenProvider::new(AppCredentials::new("cli_test", "secret"), http_for(server))
}

fn sample_token(access: &str) -> UserToken {
    UserToken {
        access_token: access.to_string(),
        refresh_token: Some("r-1".to_string()),
        expires_at: Utc::now() + chrono::Duration::hours(2),
        refresh_expires_at: None,
        user: Some(UserInfo {
            name: "Alice".to_string(),
            open_id: "ou_1".to_string(),
            ..UserInfo::default()
        }),
    }
}

async fn mount_app_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/v3/app_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "msg": "ok",
            "app_access_token": "a-app",
            "expire": 7200
        })))
        .mount(server)
        .await;
}

// ============================================================================
// TokenProvider
// ============================================================================

#[tokio::test]
async fn test_tenant_token_fetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v3/tenant_access_token/internal"))
        .and(body_string_contains("cli_test"))
        .and(body_string_contains("secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": "t-123",
            "expire": 7200
        })))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    assert_eq!(provider.tenant_token().await.unwrap(), "t-123");
}

#[tokio::test]
async fn test_tenant_token_caching() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v3/tenant_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "tenant_access_token": "t-cached",
            "expire": 7200
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let clone = provider.clone();

    assert_eq!(provider.tenant_token().await.unwrap(), "t-cached");
    assert_eq!(clone.tenant_token().await.unwrap(), "t-cached");
    assert_eq!(provider.tenant_token().await.unwrap(), "t-cached");
}

#[tokio::test]
async fn test_tenant_token_refetched_after_clear() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v3/tenant_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "tenant_access_token": "t-again",
            "expire": 7200
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    provider.tenant_token().await.unwrap();
    provider.clear_cache().await;
    provider.tenant_token().await.unwrap();
}

#[tokio::test]
async fn test_tenant_token_error_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v3/tenant_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 10014,
            "msg": "app secret invalid"
        })))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let err = provider.tenant_token().await.unwrap_err();

    assert!(matches!(err, Error::Auth { .. }));
    assert!(err.to_string().contains("app secret invalid"));
}

// ============================================================================
// OAuthService
// ============================================================================

#[tokio::test]
async fn test_authorization_url() {
    let mock_server = MockServer::start().await;
    let oauth = OAuthService::new(
        provider_for(&mock_server),
        http_for(&mock_server),
        "https://open.larksuite.com/open-apis",
        "http://localhost:3001/api/auth/callback",
    );

    let url = oauth.authorization_url("state-1").unwrap();
    assert_eq!(url.path(), "/open-apis/authen/v1/authorize");

    let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs["app_id"], "cli_test");
    assert_eq!(pairs["redirect_uri"], "http://localhost:3001/api/auth/callback");
    assert_eq!(pairs["state"], "state-1");
    assert!(pairs["scope"].contains("bitable:app"));
}

#[tokio::test]
async fn test_exchange_code() {
    let mock_server = MockServer::start().await;
    mount_app_token(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/authen/v1/oidc/access_token"))
        .and(header("Authorization", "Bearer a-app"))
        .and(body_string_contains("authorization_code"))
        .and(body_string_contains("code-xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": {
                "access_token": "u-access",
                "refresh_token": "u-refresh",
                "expires_in": 6900,
                "refresh_expires_in": 2_591_700,
                "token_type": "Bearer"
            }
        })))
        .mount(&mock_server)
        .await;

    let oauth = OAuthService::new(
        provider_for(&mock_server),
        http_for(&mock_server),
        mock_server.uri(),
        "http://localhost/cb",
    );

    let token = oauth.exchange_code("code-xyz").await.unwrap();
    assert_eq!(token.access_token, "u-access");
    assert_eq!(token.refresh_token.as_deref(), Some("u-refresh"));
    assert!(token.is_valid());
    assert!(token.can_refresh());
}

#[tokio::test]
async fn test_exchange_code_rejected() {
    let mock_server = MockServer::start().await;
    mount_app_token(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/authen/v1/oidc/access_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "code": 20003,
            "msg": "invalid code"
        })))
        .mount(&mock_server)
        .await;

    let oauth = OAuthService::new(
        provider_for(&mock_server),
        http_for(&mock_server),
        mock_server.uri(),
        "http://localhost/cb",
    );

    let err = oauth.exchange_code("stale").await.unwrap_err();
    assert!(matches!(err, Error::OAuth2 { .. }));
    assert!(err.to_string().contains("invalid code"));

    assert!(oauth.exchange_code("").await.is_err());
}

#[tokio::test]
async fn test_refresh_keeps_profile() {
    let mock_server = MockServer::start().await;
    mount_app_token(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/authen/v1/oidc/refresh_access_token"))
        .and(body_string_contains("r-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": {
                "access_token": "u-new",
                "refresh_token": "r-2",
                "expires_in": 6900
            }
        })))
        .mount(&mock_server)
        .await;

    let oauth = OAuthService::new(
        provider_for(&mock_server),
        http_for(&mock_server),
        mock_server.uri(),
        "http://localhost/cb",
    );

    let old = UserToken {
        expires_at: Utc::now() - chrono::Duration::minutes(5),
        ..sample_token("u-old")
    };
    let refreshed = oauth.refresh(&old).await.unwrap();

    assert_eq!(refreshed.access_token, "u-new");
    assert_eq!(refreshed.refresh_token.as_deref(), Some("r-2"));
    assert_eq!(refreshed.user.unwrap().name, "Alice");
}

#[tokio::test]
async fn test_refresh_without_refresh_token() {
    let mock_server = MockServer::start().await;
    let oauth = OAuthService::new(
        provider_for(&mock_server),
        http_for(&mock_server),
        mock_server.uri(),
        "http://localhost/cb",
    );

    let token = UserToken {
        refresh_token: None,
        ..sample_token("u-1")
    };
    let err = oauth.refresh(&token).await.unwrap_err();
    assert!(matches!(err, Error::TokenRefresh { .. }));
}

// ============================================================================
// Token stores
// ============================================================================

#[tokio::test]
async fn test_memory_store_roundtrip() {
    let store = MemoryTokenStore::new();
    assert!(store.get("s1").await.unwrap().is_none());

    store.put("s1", sample_token("u-1")).await.unwrap();
    store.put("s2", sample_token("u-2")).await.unwrap();
    assert_eq!(store.len().await, 2);
    assert_eq!(
        store.get("s1").await.unwrap().unwrap().access_token,
        "u-1"
    );

    store.put("s1", sample_token("u-1b")).await.unwrap();
    assert_eq!(
        store.get("s1").await.unwrap().unwrap().access_token,
        "u-1b"
    );

    store.remove("s1").await.unwrap();
    assert!(store.get("s1").await.unwrap().is_none());
    assert!(!store.is_empty().await);
}

#[tokio::test]
async fn test_file_store_persists_across_opens() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sessions.json");

    let store = FileTokenStore::open(&path).unwrap();
    store.put("s1", sample_token("u-1")).await.unwrap();
    assert!(path.exists());

    let reopened = FileTokenStore::open(&path).unwrap();
    let token = reopened.get("s1").await.unwrap().unwrap();
    assert_eq!(token.access_token, "u-1");
    assert_eq!(token.user.unwrap().open_id, "ou_1");

    reopened.remove("s1").await.unwrap();
    let reopened = FileTokenStore::open(&path).unwrap();
    assert!(reopened.get("s1").await.unwrap().is_none());
}

#[test]
fn test_file_store_rejects_corrupt_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sessions.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = FileTokenStore::open(&path).unwrap_err();
    assert!(matches!(err, Error::Store { .. }));
}

#[test]
fn test_cookie_token_codec() {
    let token = sample_token("u-cookie");
    let encoded = encode_cookie_token(&token).unwrap();

    assert!(!encoded.contains(';'));
    assert_eq!(decode_cookie_token(&encoded), Some(token));
    assert_eq!(decode_cookie_token("%%%not-base64"), None);
}

// ============================================================================
// Sessions
// ============================================================================

fn sessions_for(server: &MockServer, backend: SessionBackend) -> SessionManager {
    let oauth = OAuthService::new(
        provider_for(server),
        http_for(server),
        server.uri(),
        "http://localhost/cb",
    );
    SessionManager::new(backend, oauth)
}

async fn mount_refresh(server: &MockServer) {
    mount_app_token(server).await;
    Mock::given(method("POST"))
        .and(path("/authen/v1/oidc/refresh_access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": { "access_token": "u-fresh", "refresh_token": "r-2", "expires_in": 6900 }
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn expired(access: &str) -> UserToken {
    UserToken {
        expires_at: Utc::now() - chrono::Duration::minutes(1),
        ..sample_token(access)
    }
}

#[tokio::test]
async fn test_session_resolves_valid_token() {
    let mock_server = MockServer::start().await;
    let store = MemoryTokenStore::new();
    store.put("s1", sample_token("u-1")).await.unwrap();
    let sessions = sessions_for(&mock_server, SessionBackend::store(store));

    let resolved = sessions.resolve(Some("s1"), None).await.unwrap();
    assert!(resolved.is_authenticated());
    assert_eq!(resolved.token.unwrap().access_token, "u-1");

    assert!(!sessions.resolve(Some("other"), None).await.unwrap().is_authenticated());
    assert!(!sessions.resolve(None, None).await.unwrap().is_authenticated());
}

#[tokio::test]
async fn test_session_refreshes_expired_token() {
    let mock_server = MockServer::start().await;
    mount_refresh(&mock_server).await;

    let store = MemoryTokenStore::new();
    store.put("s1", expired("u-old")).await.unwrap();
    let sessions = sessions_for(&mock_server, SessionBackend::store(store.clone()));

    let resolved = sessions.resolve(Some("s1"), None).await.unwrap();
    assert_eq!(resolved.token.unwrap().access_token, "u-fresh");
    assert_eq!(resolved.updated_cookie, None);
    assert_eq!(
        store.get("s1").await.unwrap().unwrap().access_token,
        "u-fresh"
    );
}

#[tokio::test]
async fn test_session_expired_without_refresh_token() {
    let mock_server = MockServer::start().await;
    let store = MemoryTokenStore::new();
    store
        .put(
            "s1",
            UserToken {
                refresh_token: None,
                ..expired("u-old")
            },
        )
        .await
        .unwrap();
    let sessions = sessions_for(&mock_server, SessionBackend::store(store));

    assert!(!sessions.resolve(Some("s1"), None).await.unwrap().is_authenticated());
}

#[tokio::test]
async fn test_cookie_session_roundtrip() {
    let mock_server = MockServer::start().await;
    mount_refresh(&mock_server).await;
    let sessions = sessions_for(&mock_server, SessionBackend::Cookie);

    let payload = sessions
        .save(None, sample_token("u-cookie"))
        .await
        .unwrap()
        .unwrap();
    let resolved = sessions.resolve(None, Some(&payload)).await.unwrap();
    assert_eq!(resolved.token.unwrap().access_token, "u-cookie");

    let stale = encode_cookie_token(&expired("u-old")).unwrap();
    let resolved = sessions.resolve(None, Some(&stale)).await.unwrap();
    assert_eq!(resolved.token.unwrap().access_token, "u-fresh");
    let cookie = resolved.updated_cookie.unwrap();
    assert_eq!(decode_cookie_token(&cookie).unwrap().access_token, "u-fresh");

    sessions.clear(None).await.unwrap();
}

#[tokio::test]
async fn test_store_session_requires_id() {
    let mock_server = MockServer::start().await;
    let sessions = sessions_for(&mock_server, SessionBackend::store(MemoryTokenStore::new()));

    let err = sessions.save(None, sample_token("u-1")).await.unwrap_err();
    assert!(matches!(err, Error::Store { .. }));
}
