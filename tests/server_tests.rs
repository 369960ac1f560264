//! HTTP server tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`; the vendor API is mocked.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use base_snapshot::cli::{router, AppState, SESSION_COOKIE, TOKEN_COOKIE};
use base_snapshot::config::{LarkConfig, ServerConfig, SessionMode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header as header_is, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLIENT_URL: &str = "http://localhost:5173";

fn app_for(server: &MockServer, mode: SessionMode) -> Router {
    let mut lark = LarkConfig::new("cli_test", "secret");
    lark.api_base = server.uri();

    let mut config = ServerConfig::new(lark);
    config.client_url = CLIENT_URL.to_string();
    config.session_mode = mode;

    router(AppState::from_config(config).unwrap())
}

async fn mount_oauth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/v3/app_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "app_access_token": "a-app",
            "expire": 7200
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/authen/v1/oidc/access_token"))
        .and(body_partial_json(json!({ "code": "code-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {
                "access_token": "u-user",
                "refresh_token": "r-user",
                "expires_in": 7200,
                "refresh_expires_in": 2_592_000
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/authen/v1/user_info"))
        .and(header_is("authorization", "Bearer u-user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "name": "Alice", "open_id": "ou_1" }
        })))
        .mount(server)
        .await;
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// `name=value` pair of a Set-Cookie header, ready to send back
fn cookie_pair(set_cookies: &[String], name: &str) -> Option<String> {
    set_cookies
        .iter()
        .filter_map(|c| c.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

// ============================================================================
// Health and auth
// ============================================================================

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Memory)
        .oneshot(get("/api/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], json!("ok"));
}

#[tokio::test]
async fn test_login_redirects_with_session_state() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Memory)
        .oneshot(get("/api/auth/login", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let cookies = set_cookies(&response);
    let pair = cookie_pair(&cookies, SESSION_COOKIE).expect("session cookie");
    let session_id = pair.trim_start_matches(&format!("{SESSION_COOKIE}="));
    assert!(!session_id.is_empty());
    assert!(cookies[0].contains("HttpOnly"));

    let target = location(&response);
    assert!(target.starts_with(&format!("{}/authen/v1/authorize?", server.uri())));
    assert!(target.contains("app_id=cli_test"));
    assert!(target.contains(&format!("state={session_id}")));
}

#[tokio::test]
async fn test_login_reuses_existing_session() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Memory)
        .oneshot(get("/api/auth/login", Some("lark_session=sid-7")))
        .await
        .unwrap();

    assert!(location(&response).contains("state=sid-7"));
}

#[tokio::test]
async fn test_callback_rejects_mismatched_state() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Memory)
        .oneshot(get(
            "/api/auth/callback?code=code-1&state=other",
            Some("lark_session=sid-1"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), format!("{CLIENT_URL}/?auth_error=invalid_state"));
}

#[tokio::test]
async fn test_callback_then_status_in_memory_mode() {
    let server = MockServer::start().await;
    mount_oauth(&server).await;
    let app = app_for(&server, SessionMode::Memory);

    let response = app
        .clone()
        .oneshot(get(
            "/api/auth/callback?code=code-1&state=sid-1",
            Some("lark_session=sid-1"),
        ))
        .await
        .unwrap();
    assert_eq!(location(&response), format!("{CLIENT_URL}/?auth=success"));
    assert!(cookie_pair(&set_cookies(&response), TOKEN_COOKIE).is_none());

    let response = app
        .clone()
        .oneshot(get("/api/auth/status", Some("lark_session=sid-1")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], json!(true));
    assert_eq!(body["user"]["name"], json!("Alice"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header(header::COOKIE, "lark_session=sid-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await["success"], json!(true));

    let response = app
        .oneshot(get("/api/auth/status", Some("lark_session=sid-1")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["authenticated"], json!(false));
}

#[tokio::test]
async fn test_callback_in_cookie_mode_sets_token_cookie() {
    let server = MockServer::start().await;
    mount_oauth(&server).await;
    let app = app_for(&server, SessionMode::Cookie);

    let response = app
        .clone()
        .oneshot(get(
            "/api/auth/callback?code=code-1&state=sid-1",
            Some("lark_session=sid-1"),
        ))
        .await
        .unwrap();
    let cookies = set_cookies(&response);
    let token = cookie_pair(&cookies, TOKEN_COOKIE).expect("token cookie");

    let response = app
        .oneshot(get(
            "/api/auth/status",
            Some(&format!("lark_session=sid-1; {token}")),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], json!(true));
    assert_eq!(body["user"]["open_id"], json!("ou_1"));
}

#[tokio::test]
async fn test_status_without_session() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Memory)
        .oneshot(get("/api/auth/status", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "authenticated": false }));
}

#[tokio::test]
async fn test_logout_expires_cookies() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Cookie)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
}

// ============================================================================
// Snapshot endpoints
// ============================================================================

#[tokio::test]
async fn test_snapshot_invalid_body_still_answers_ok() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Memory)
        .oneshot(post_json("/api/snapshot", "{ not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["errors"][0]["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request"));
}

#[tokio::test]
async fn test_snapshot_requires_name() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Memory)
        .oneshot(post_json(
            "/api/snapshot",
            r#"{ "sourceBaseUrl": "https://x.larksuite.com/base/appSrc", "targetBaseName": " " }"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], json!(false));
}

#[tokio::test]
async fn test_snapshot_setup_failure_is_reported() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Memory)
        .oneshot(post_json(
            "/api/snapshot",
            r#"{ "sourceBaseUrl": "https://example.com/elsewhere", "targetBaseName": "Copy" }"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["tablesProcessed"], json!(0));
}

#[tokio::test]
async fn test_preview_rejects_unrecognized_url() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Memory)
        .oneshot(post_json(
            "/api/snapshot/preview",
            r#"{ "sourceBaseUrl": "https://example.com/elsewhere" }"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_cors_allows_client_origin_with_credentials() {
    let server = MockServer::start().await;
    let response = app_for(&server, SessionMode::Memory)
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/snapshot")
                .header(header::ORIGIN, CLIENT_URL)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        CLIENT_URL
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}
