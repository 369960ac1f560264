//! HTTP server for the snapshot UI

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::{
    FileTokenStore, MemoryTokenStore, OAuthService, ResolvedSession, SessionBackend,
    SessionManager, UserInfo,
};
use crate::config::{ServerConfig, SessionMode};
use crate::error::{Error, Result};
use crate::lark::LarkClient;
use crate::snapshot::{SnapshotConfig, SnapshotEngine, SnapshotResult};

/// Cookie holding the opaque session id
pub const SESSION_COOKIE: &str = "lark_session";
/// Cookie holding the encoded token (cookie session mode)
pub const TOKEN_COOKIE: &str = "lark_token";

const SESSION_MAX_AGE_DAYS: i64 = 30;

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    client: LarkClient,
    sessions: SessionManager,
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Assemble state from already-built parts
    pub fn new(client: LarkClient, sessions: SessionManager, config: ServerConfig) -> Self {
        Self {
            client,
            sessions,
            config: Arc::new(config),
        }
    }

    /// Build clients and the session backend from configuration
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let (client, oauth) = config.lark.build_clients(&config.redirect_uri);
        let backend = match config.session_mode {
            SessionMode::Memory => SessionBackend::store(MemoryTokenStore::new()),
            SessionMode::File => SessionBackend::store(FileTokenStore::open(&config.session_file)?),
            SessionMode::Cookie => SessionBackend::Cookie,
        };
        Ok(Self::new(client, SessionManager::new(backend, oauth), config))
    }

    fn oauth(&self) -> &OAuthService {
        self.sessions.oauth()
    }
}

/// Response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Query string of the OAuth callback
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Body of the preview endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewRequest {
    source_base_url: String,
}

/// Body of the status endpoint
#[derive(Debug, Serialize)]
struct AuthStatus {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserInfo>,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let cors = match HeaderValue::from_str(state.config.client_url.trim_end_matches('/')) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]),
        Err(e) => {
            warn!(client_url = %state.config.client_url, error = %e, "Invalid client URL, CORS disabled");
            CorsLayer::new()
        }
    };

    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", get(login))
        .route("/api/auth/callback", get(callback))
        .route("/api/auth/status", get(status))
        .route("/api/auth/logout", post(logout))
        .route("/api/snapshot", post(snapshot))
        .route("/api/snapshot/preview", post(preview))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Start the HTTP server
pub async fn serve(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let port = config.port;
    let mode = config.session_mode;
    let app = router(AppState::from_config(config)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(session_mode = %mode, "Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to port {port}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::config(format!("Server error: {e}")))?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": chrono::Utc::now().to_rfc3339() }))
}

/// Redirect to the vendor's authorization page
///
/// The session id doubles as the OAuth `state`.
async fn login(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session_id =
        read_cookie(&headers, SESSION_COOKIE).unwrap_or_else(|| Uuid::new_v4().to_string());

    match state.oauth().authorization_url(&session_id) {
        Ok(url) => with_cookies(
            Redirect::temporary(url.as_str()).into_response(),
            &[session_cookie(&state.config, &session_id)],
        ),
        Err(e) => error_response(&e),
    }
}

/// Redeem the authorization code and return to the UI
async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        warn!(error = %error, "Authorization was declined");
        return client_redirect(&state.config, Err(&error));
    }

    let session_id = read_cookie(&headers, SESSION_COOKIE);
    let (Some(session_id), Some(returned)) = (session_id, params.state) else {
        return client_redirect(&state.config, Err("missing_state"));
    };
    if session_id != returned {
        warn!("OAuth state does not match session");
        return client_redirect(&state.config, Err("invalid_state"));
    }

    let code = params.code.unwrap_or_default();
    let token = match state.oauth().exchange_code(&code).await {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "Code exchange failed");
            return client_redirect(&state.config, Err("exchange_failed"));
        }
    };

    let token = match state.client.as_user(&token.access_token).current_user().await {
        Ok(user) => {
            info!(user = %user.name, "User signed in");
            OAuthService::with_user(token, user)
        }
        Err(e) => {
            warn!(error = %e, "Could not load user profile");
            token
        }
    };

    match state.sessions.save(Some(&session_id), token).await {
        Ok(payload) => {
            let mut cookies = vec![session_cookie(&state.config, &session_id)];
            if let Some(payload) = payload {
                cookies.push(token_cookie(&state.config, &payload));
            }
            with_cookies(client_redirect(&state.config, Ok(())), &cookies)
        }
        Err(e) => {
            warn!(error = %e, "Could not store session");
            client_redirect(&state.config, Err("session_failed"))
        }
    }
}

/// Whether the caller has a valid session
async fn status(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match resolve_session(&state, &headers).await {
        Ok(resolved) => {
            let body = AuthStatus {
                authenticated: resolved.is_authenticated(),
                user: resolved.token.as_ref().and_then(|t| t.user.clone()),
            };
            refreshed_cookie(&state.config, &resolved, Json(body).into_response())
        }
        Err(e) => error_response(&e),
    }
}

/// Forget the caller's session
async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session_id = read_cookie(&headers, SESSION_COOKIE);
    if let Err(e) = state.sessions.clear(session_id.as_deref()).await {
        return error_response(&e);
    }

    with_cookies(
        Json(json!({ "success": true })).into_response(),
        &[
            removal_cookie(&state.config, SESSION_COOKIE),
            removal_cookie(&state.config, TOKEN_COOKIE),
        ],
    )
}

/// Run a snapshot; always answers 200 with a [`SnapshotResult`]
async fn snapshot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Json<SnapshotConfig>, JsonRejection>,
) -> Response {
    let config = match body {
        Ok(Json(config)) => config,
        Err(rejection) => {
            return Json(SnapshotResult::failed(format!(
                "Invalid request: {}",
                rejection.body_text()
            )))
            .into_response();
        }
    };
    if config.source_base_url.trim().is_empty() || config.target_base_name.trim().is_empty() {
        return Json(SnapshotResult::failed(
            "sourceBaseUrl and targetBaseName are required",
        ))
        .into_response();
    }

    let resolved = match resolve_session(&state, &headers).await {
        Ok(resolved) => resolved,
        Err(e) => return Json(SnapshotResult::failed(e.to_string())).into_response(),
    };

    let engine = SnapshotEngine::new(client_for(&state, &resolved));
    let result = engine.run(&config).await;
    refreshed_cookie(&state.config, &resolved, Json(result).into_response())
}

/// Describe what a snapshot would copy
async fn preview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Json<PreviewRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(rejection.body_text())),
            )
                .into_response();
        }
    };

    let resolved = match resolve_session(&state, &headers).await {
        Ok(resolved) => resolved,
        Err(e) => return error_response(&e),
    };

    let engine = SnapshotEngine::new(client_for(&state, &resolved));
    let response = match engine.preview(&request.source_base_url).await {
        Ok(preview) => Json(ApiResponse::success(preview)).into_response(),
        Err(e) => error_response(&e),
    };
    refreshed_cookie(&state.config, &resolved, response)
}

// ============================================================================
// Helpers
// ============================================================================

async fn resolve_session(state: &AppState, headers: &HeaderMap) -> Result<ResolvedSession> {
    let session_id = read_cookie(headers, SESSION_COOKIE);
    let payload = read_cookie(headers, TOKEN_COOKIE);
    state
        .sessions
        .resolve(session_id.as_deref(), payload.as_deref())
        .await
}

/// The user's client when signed in, the app's otherwise
fn client_for(state: &AppState, resolved: &ResolvedSession) -> LarkClient {
    match &resolved.token {
        Some(token) => state.client.as_user(&token.access_token),
        None => state.client.clone(),
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::UnrecognizedBaseUrl { .. } | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        Error::Unauthenticated => StatusCode::UNAUTHORIZED,
        e if e.is_permission_denied() => StatusCode::FORBIDDEN,
        Error::Api { .. }
        | Error::Http(_)
        | Error::HttpStatus { .. }
        | Error::Timeout { .. }
        | Error::RateLimited { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &Error) -> Response {
    (status_for(err), Json(ApiResponse::<()>::error(err.to_string()))).into_response()
}

/// Redirect to the UI, flagging the sign-in outcome in the query string
fn client_redirect(config: &ServerConfig, outcome: std::result::Result<(), &str>) -> Response {
    let target = match Url::parse(&config.client_url) {
        Ok(mut url) => {
            let (key, value) = match outcome {
                Ok(()) => ("auth", "success"),
                Err(reason) => ("auth_error", reason),
            };
            url.query_pairs_mut().append_pair(key, value);
            url.to_string()
        }
        Err(_) => config.client_url.clone(),
    };
    Redirect::temporary(&target).into_response()
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let cookie = Cookie::parse(pair.trim()).ok()?;
            (cookie.name() == name && !cookie.value().is_empty())
                .then(|| cookie.value().to_owned())
        })
}

fn base_cookie(config: &ServerConfig, name: &'static str, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_secure(config.secure_cookies());
    // Cross-site UI origins need SameSite=None, which browsers only accept on secure cookies.
    cookie.set_same_site(if config.secure_cookies() {
        SameSite::None
    } else {
        SameSite::Lax
    });
    cookie
}

fn session_cookie(config: &ServerConfig, session_id: &str) -> Cookie<'static> {
    let mut cookie = base_cookie(config, SESSION_COOKIE, session_id.to_string());
    cookie.set_max_age(cookie::time::Duration::days(SESSION_MAX_AGE_DAYS));
    cookie
}

fn token_cookie(config: &ServerConfig, payload: &str) -> Cookie<'static> {
    let mut cookie = base_cookie(config, TOKEN_COOKIE, payload.to_string());
    cookie.set_max_age(cookie::time::Duration::days(SESSION_MAX_AGE_DAYS));
    cookie
}

fn removal_cookie(config: &ServerConfig, name: &'static str) -> Cookie<'static> {
    let mut cookie = base_cookie(config, name, String::new());
    cookie.make_removal();
    cookie
}

fn refreshed_cookie(config: &ServerConfig, resolved: &ResolvedSession, response: Response) -> Response {
    match &resolved.updated_cookie {
        Some(payload) => with_cookies(response, &[token_cookie(config, payload)]),
        None => response,
    }
}

fn with_cookies(mut response: Response, cookies: &[Cookie<'static>]) -> Response {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!(cookie = cookie.name(), error = %e, "Skipping unencodable cookie"),
        }
    }
    response
}
