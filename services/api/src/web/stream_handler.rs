//! services/api/src/web/stream_handler.rs
//!
//! The entry point of a streaming chat turn. The handler validates the
//! request, persists the user's message, classifies the turn, and hands it to
//! the relay task. The response body is the relay's event stream.

use crate::web::{
    error::{bad_request, http_error, port_error, HttpError},
    protocol::StreamRequest,
    state::AppState,
    stream_task::{relay_turn, EventSink, Turn},
};
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Extension, Json,
};
use bytes::Bytes;
use chat_studio_core::{
    domain::Role,
    intent::{self, Intent},
    ports::{PortError, PortResult},
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

const EVENT_BUFFER: usize = 32;

/// Streams one chat turn as server-sent events.
#[utoipa::path(
    post,
    path = "/api/chat/stream",
    request_body = StreamRequest,
    responses(
        (status = 200, description = "Event stream of start, chunk, and done or error events", content_type = "text/event-stream", body = String),
        (status = 400, description = "Missing message or userId, or malformed chatId", body = crate::web::error::ErrorBody),
        (status = 401, description = "No valid session"),
        (status = 403, description = "userId or chat belongs to another user", body = crate::web::error::ErrorBody),
        (status = 404, description = "Chat not found", body = crate::web::error::ErrorBody),
        (status = 500, description = "Internal server error", body = crate::web::error::ErrorBody)
    )
)]
pub async fn chat_stream_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session_user): Extension<String>,
    Json(req): Json<StreamRequest>,
) -> Result<Response, HttpError> {
    let message = non_blank(req.message).ok_or_else(|| bad_request("message is required"))?;
    let user_id = non_blank(req.user_id).ok_or_else(|| bad_request("userId is required"))?;
    if user_id != session_user {
        return Err(http_error(
            StatusCode::FORBIDDEN,
            "userId does not match the signed-in user",
        ));
    }

    let turn = open_turn(
        &app_state,
        &user_id,
        &message,
        req.chat_id.as_deref(),
        req.context.as_deref(),
    )
    .await
    .map_err(port_error)?;

    let (sender, mut receiver) = mpsc::channel(EVENT_BUFFER);
    let cancellation_token = CancellationToken::new();
    let sink = EventSink::new(sender, turn.chat_id);
    tokio::spawn(relay_turn(
        app_state.clone(),
        turn,
        sink,
        cancellation_token.clone(),
    ));

    // Dropping the body (client disconnect) drops the guard and cancels the relay.
    let guard = cancellation_token.drop_guard();
    let events = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = receiver.recv().await {
            let terminal = event.is_terminal();
            yield Ok::<Bytes, Infallible>(event.encode());
            if terminal {
                break;
            }
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(events))
        .map_err(|e| http_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Resolves or creates the chat, persists the user's message, and classifies
/// the turn. Nothing is sent to the completion backend yet.
pub async fn open_turn(
    app_state: &AppState,
    user_id: &str,
    message: &str,
    chat_id: Option<&str>,
    context: Option<&str>,
) -> PortResult<Turn> {
    let chat = match chat_id.filter(|id| !id.trim().is_empty()) {
        Some(raw) => {
            let id = Uuid::parse_str(raw.trim())
                .map_err(|_| PortError::InvalidInput(format!("invalid chatId '{}'", raw)))?;
            let chat = app_state.db.get_chat(id).await?;
            if chat.owner_id != user_id {
                return Err(PortError::Forbidden(format!(
                    "chat {} belongs to another user",
                    id
                )));
            }
            chat
        }
        None => {
            let title = app_state.chat_title(message).await;
            let chat = app_state.db.create_chat(user_id, &title).await?;
            info!(chat_id = %chat.id, title = %chat.title, "Created chat.");
            chat
        }
    };

    app_state
        .db
        .append_message(chat.id, Role::User, message)
        .await?;

    let intent = match intent::decide(message, context) {
        Some((rule, intent)) => {
            info!(chat_id = %chat.id, rule, "Turn classified as {:?}.", intent);
            intent
        }
        None => Intent::Plain,
    };

    Ok(Turn {
        chat_id: chat.id,
        owner_id: user_id.to_string(),
        intent,
        prompt: intent::shape_prompt(intent, message),
    })
}
