//! services/api/src/web/error.rs
//!
//! Maps port errors onto HTTP responses with a JSON `{ "error": ... }` body.

use axum::{http::StatusCode, Json};
use chat_studio_core::ports::PortError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// The error half of every REST handler's result.
pub type HttpError = (StatusCode, Json<ErrorBody>);

pub fn http_error(status: StatusCode, message: impl Into<String>) -> HttpError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

pub fn bad_request(message: impl Into<String>) -> HttpError {
    http_error(StatusCode::BAD_REQUEST, message)
}

pub fn status_for(e: &PortError) -> StatusCode {
    match e {
        PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Forbidden(_) => StatusCode::FORBIDDEN,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Configuration(_) | PortError::Upstream(_) | PortError::Unexpected(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// The message shown to the client. Internal details of server-side
/// failures are not echoed.
pub fn public_message(e: &PortError) -> String {
    match e {
        PortError::Configuration(_) => "AI service is not configured".to_string(),
        PortError::Upstream(_) => "AI service request failed".to_string(),
        PortError::Unexpected(_) => "Internal server error".to_string(),
        other => other.to_string(),
    }
}

/// Converts a port error, logging server-side failures.
pub fn port_error(e: PortError) -> HttpError {
    let status = status_for(&e);
    if status.is_server_error() {
        error!("Request failed: {:?}", e);
    }
    http_error(status, public_message(&e))
}
