//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chat_studio_core::ports::PortError;
use std::sync::Arc;
use tracing::debug;

use crate::web::{
    auth::session_id_from,
    error::{http_error, port_error},
    state::AppState,
};

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id (a `String`) into request extensions for
/// handlers to use. If invalid or missing, returns 401 Unauthorized. A store
/// failure while checking the session is a 500, not a sign-out.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(auth_session_id) = session_id_from(req.headers()).map(str::to_string) else {
        return http_error(StatusCode::UNAUTHORIZED, "Not signed in").into_response();
    };

    let user_id = match state.db.validate_auth_session(&auth_session_id).await {
        Ok(user_id) => user_id,
        Err(PortError::Unauthorized) => {
            debug!("Rejected auth session");
            return http_error(StatusCode::UNAUTHORIZED, "Session expired or invalid")
                .into_response();
        }
        Err(e) => return port_error(e).into_response(),
    };

    req.extensions_mut().insert(user_id);
    next.run(req).await
}
