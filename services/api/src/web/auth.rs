//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for signup, login, logout, and managing signed-in sessions.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chat_studio_core::{domain::AuthSession, ports::PortError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{
    error::{bad_request, http_error, port_error, ErrorBody, HttpError},
    state::AppState,
};

const SESSION_COOKIE: &str = "session";
const SESSION_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: String,
    pub email: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Whether this is the session making the request.
    pub current: bool,
}

impl SessionView {
    fn new(session: AuthSession, current_id: Option<&str>) -> Self {
        Self {
            current: current_id == Some(session.id.as_str()),
            id: session.id,
            expires_at: session.expires_at,
            created_at: session.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionView>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TerminateSessionsRequest {
    pub session_id: Option<String>,
    #[serde(default)]
    pub terminate_all: bool,
}

#[derive(Serialize, ToSchema)]
pub struct TerminateSessionsResponse {
    pub success: bool,
}

//=========================================================================================
// Cookie Helpers
//=========================================================================================

/// Reads the auth session id from the `Cookie` header.
pub fn session_id_from(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

fn cleared_session_cookie() -> String {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    )
}

fn session_cookie(auth_session_id: &str) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        auth_session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    )
}

/// Creates a fresh auth session for `user_id` and returns its cookie.
async fn start_session(state: &AppState, user_id: &str) -> Result<String, HttpError> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            http_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session")
        })?;
    Ok(session_cookie(&auth_session_id))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request or email already registered", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(bad_request("email and password are required"));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            http_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password")
        })?
        .to_string();

    // 2. Create user in database
    let user = state
        .db
        .create_user_with_email(&email, &password_hash)
        .await
        .map_err(port_error)?;

    // 3. Start a 30-day session
    let cookie = start_session(&state, &user.user_id).await?;
    info!(user_id = %user.user_id, "User signed up.");

    let response = AuthResponse {
        user_id: user.user_id,
        email: user.email.unwrap_or_default(),
    };
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let invalid = || http_error(StatusCode::UNAUTHORIZED, "Invalid email or password");

    // 1. Get user by email
    let email = req.email.trim().to_lowercase();
    let user_creds = match state.db.get_user_by_email(&email).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Err(invalid()),
        Err(e) => return Err(port_error(e)),
    };

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        http_error(StatusCode::INTERNAL_SERVER_ERROR, "Authentication error")
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid());
    }

    // 3. Start a 30-day session
    let cookie = start_session(&state, &user_creds.user_id).await?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session", body = ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let auth_session_id = session_id_from(&headers)
        .ok_or_else(|| http_error(StatusCode::UNAUTHORIZED, "No session found"))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(port_error)?;

    Ok((StatusCode::OK, [(header::SET_COOKIE, cleared_session_cookie())]))
}

/// GET /api/sessions - List the caller's live sessions
#[utoipa::path(
    get,
    path = "/api/sessions",
    responses(
        (status = 200, description = "Live sessions, newest first", body = SessionsResponse),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    headers: HeaderMap,
) -> Result<Json<SessionsResponse>, HttpError> {
    let current = session_id_from(&headers);
    let sessions = state
        .db
        .list_auth_sessions(&user_id)
        .await
        .map_err(port_error)?
        .into_iter()
        .map(|session| SessionView::new(session, current))
        .collect();
    Ok(Json(SessionsResponse { sessions }))
}

/// DELETE /api/sessions - Revoke one of the caller's sessions, or all of them
#[utoipa::path(
    delete,
    path = "/api/sessions",
    request_body = TerminateSessionsRequest,
    responses(
        (status = 200, description = "Sessions revoked", body = TerminateSessionsResponse),
        (status = 400, description = "Neither sessionId nor terminateAll given", body = ErrorBody),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 404, description = "No such session for this user", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn terminate_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    headers: HeaderMap,
    Json(req): Json<TerminateSessionsRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let current = session_id_from(&headers);

    let ends_current = if req.terminate_all {
        state
            .db
            .delete_auth_sessions_for_user(&user_id)
            .await
            .map_err(port_error)?;
        info!(user_id = %user_id, "Revoked every session.");
        true
    } else if let Some(session_id) = req.session_id.as_deref().filter(|id| !id.is_empty()) {
        let removed = state
            .db
            .delete_user_auth_session(&user_id, session_id)
            .await
            .map_err(port_error)?;
        if !removed {
            return Err(http_error(StatusCode::NOT_FOUND, "Session not found"));
        }
        current == Some(session_id)
    } else {
        return Err(bad_request("sessionId or terminateAll is required"));
    };

    let response = Json(TerminateSessionsResponse { success: true });
    if ends_current {
        Ok(([(header::SET_COOKIE, cleared_session_cookie())], response).into_response())
    } else {
        Ok(response.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_the_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; lang=en"),
        );
        assert_eq!(session_id_from(&headers), Some("abc-123"));
    }

    #[test]
    fn missing_or_empty_session_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id_from(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_id_from(&headers), None);
    }

    #[test]
    fn cookie_lasts_thirty_days() {
        let cookie = session_cookie("abc");
        assert!(cookie.starts_with("session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains(&format!("Max-Age={}", 30 * 24 * 60 * 60)));
    }

    #[test]
    fn marks_only_the_requesting_session_as_current() {
        let session = |id: &str| AuthSession {
            id: id.to_string(),
            user_id: "u1".to_string(),
            expires_at: Utc::now(),
            created_at: Utc::now(),
        };
        assert!(SessionView::new(session("a"), Some("a")).current);
        assert!(!SessionView::new(session("b"), Some("a")).current);
        assert!(!SessionView::new(session("b"), None).current);
    }
}
