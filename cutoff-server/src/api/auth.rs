//! Admin authentication: login/logout/status and the session middleware
//!
//! A single operator account is configured (username + password). A
//! successful login sets the encrypted `admin_session` cookie; protected
//! routes decrypt it on every request.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cutoff_common::session::{credentials_match, AdminSession, Role, SESSION_COOKIE_NAME};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// User as reported to the browser
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub username: String,
    pub role: Role,
}

impl From<&AdminSession> for SessionUser {
    fn from(session: &AdminSession) -> Self {
        Self {
            username: session.username.clone(),
            role: session.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

/// Value of a named cookie from the request's Cookie headers
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

/// Decrypt the session cookie, if present and valid
pub fn current_session(state: &AppState, headers: &HeaderMap) -> Option<AdminSession> {
    let value = cookie_value(headers, SESSION_COOKIE_NAME)?;
    match state.sessions.decode(value) {
        Ok(session) => Some(session),
        Err(e) => {
            debug!("Rejected session cookie: {}", e);
            None
        }
    }
}

fn session_cookie(state: &AppState, value: &str, max_age_secs: u64) -> ApiResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE_NAME, value, max_age_secs
    );
    if max_age_secs == 0 {
        cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
    }
    if state.config.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("Invalid session cookie header: {}", e)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let (username, password) = match (request.username, request.password) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
        _ => {
            return Err(ApiError::BadRequest(
                "Username and password are required".to_string(),
            ))
        }
    };

    let user_ok = credentials_match(&username, &state.config.admin_username);
    let pass_ok = credentials_match(&password, &state.config.admin_password);
    if !(user_ok && pass_ok) {
        warn!(username = %username, "Failed admin login");
        return Ok((
            axum::http::StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid username or password" })),
        )
            .into_response());
    }

    let session = AdminSession::new(username);
    let value = state
        .sessions
        .encode(&session)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let cookie = session_cookie(&state, &value, state.sessions.max_age().as_secs())?;

    info!(username = %session.username, "Admin logged in");

    let mut response = Json(json!({
        "success": true,
        "user": SessionUser::from(&session),
    }))
    .into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>) -> ApiResult<Response> {
    let cookie = session_cookie(&state, "", 0)?;
    let mut response = Json(json!({ "success": true })).into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

/// GET /api/auth/status
pub async fn status(State(state): State<AppState>, headers: HeaderMap) -> Json<AuthStatus> {
    let session = current_session(&state, &headers);
    Json(AuthStatus {
        authenticated: session.is_some(),
        user: session.as_ref().map(SessionUser::from),
    })
}

/// Rejects requests without a valid admin session (401)
///
/// The decoded [`AdminSession`] is added to the request extensions.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = current_session(&state, request.headers()).ok_or(ApiError::Unauthorized)?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/status", get(status))
}
