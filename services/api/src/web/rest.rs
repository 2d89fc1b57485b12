//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the chat REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    auth, content,
    error::{bad_request, http_error, port_error, ErrorBody, HttpError},
    state::AppState,
    stream_handler,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chat_studio_core::{
    domain::{Chat, Feedback, FeedbackEntry, Message},
    pairing,
    ports::PortError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::list_sessions_handler,
        auth::terminate_sessions_handler,
        stream_handler::chat_stream_handler,
        complete_handler,
        list_chats_handler,
        get_chat_messages_handler,
        update_chat_handler,
        delete_chat_handler,
        feedback_handler,
        ai_performance_handler,
        content::create_blog_handler,
        content::list_blogs_handler,
        content::get_blog_handler,
        content::update_blog_handler,
        content::delete_blog_handler,
        content::create_product_handler,
        content::list_products_handler,
        content::update_product_handler,
        content::delete_product_handler,
        content::generate_product_handler,
        content::improve_product_handler,
    ),
    components(
        schemas(ErrorBody, ChatSummary, MessageView, PerformanceEntry, auth::SessionView)
    ),
    tags(
        (name = "Chat Studio API", description = "Streaming chat with blog and product materialization.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: Uuid,
    pub title: String,
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Chat> for ChatSummary {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            title: chat.title,
            favorite: chat.favorite,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub chat_id: Uuid,
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
    /// `like`, `dislike`, or absent.
    pub feedback: Option<String>,
    pub user_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            role: message.role.to_string(),
            content: message.content,
            feedback: message.feedback.map(|f| f.to_string()),
            user_comment: message.user_comment,
            created_at: message.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<MessageView>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateChatRequest {
    pub favorite: bool,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    /// `like`, `dislike`, or null to clear.
    pub feedback: Option<String>,
    pub user_comment: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct PerformanceQuery {
    /// `like`, `dislike`, or `all` (the default).
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    pub feedback: Option<String>,
    pub user_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    /// The user message that prompted this answer, if one precedes it.
    pub question: Option<String>,
}

impl From<FeedbackEntry> for PerformanceEntry {
    fn from(entry: FeedbackEntry) -> Self {
        let message = entry.message;
        Self {
            id: message.id,
            chat_id: message.chat_id,
            content: message.content,
            feedback: message.feedback.map(|f| f.to_string()),
            user_comment: message.user_comment,
            created_at: message.created_at,
            question: entry.question,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PerformanceResponse {
    pub messages: Vec<PerformanceEntry>,
}

#[derive(Deserialize, ToSchema)]
pub struct CompleteRequest {
    pub message: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CompleteResponse {
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

fn ensure_owner(chat: Chat, user_id: &str) -> Result<Chat, HttpError> {
    if chat.owner_id != user_id {
        return Err(port_error(PortError::Forbidden(format!(
            "chat {} belongs to another user",
            chat.id
        ))));
    }
    Ok(chat)
}

/// Loads a chat and checks that `user_id` owns it.
async fn owned_chat(app_state: &AppState, chat_id: Uuid, user_id: &str) -> Result<Chat, HttpError> {
    let chat = app_state.db.get_chat(chat_id).await.map_err(port_error)?;
    ensure_owner(chat, user_id)
}

/// Single-shot completion without persistence.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = CompleteRequest,
    responses(
        (status = 200, description = "Completion text", body = CompleteResponse),
        (status = 400, description = "Missing message", body = ErrorBody),
        (status = 500, description = "AI service not configured or failed", body = ErrorBody)
    )
)]
pub async fn complete_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, HttpError> {
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| bad_request("message is required"))?;
    let request = app_state.completion_request(message);
    let content = app_state
        .completion
        .complete(&request)
        .await
        .map_err(port_error)?;
    Ok(Json(CompleteResponse { content }))
}

/// Lists the signed-in user's chats, most recently updated first.
#[utoipa::path(
    get,
    path = "/api/chats",
    responses(
        (status = 200, description = "Chats of the signed-in user", body = Vec<ChatSummary>),
        (status = 401, description = "No valid session")
    )
)]
pub async fn list_chats_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
) -> Result<Json<Vec<ChatSummary>>, HttpError> {
    let chats = app_state.db.list_chats(&user_id).await.map_err(port_error)?;
    Ok(Json(chats.into_iter().map(ChatSummary::from).collect()))
}

/// Returns the messages of a chat in creation order. An unknown chat has none.
#[utoipa::path(
    get,
    path = "/api/chat/{id}",
    params(("id" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Messages of the chat", body = MessagesResponse),
        (status = 403, description = "Chat belongs to another user", body = ErrorBody)
    )
)]
pub async fn get_chat_messages_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<MessagesResponse>, HttpError> {
    match app_state.db.get_chat(chat_id).await {
        Ok(chat) => ensure_owner(chat, &user_id)?,
        Err(PortError::NotFound(_)) => {
            return Ok(Json(MessagesResponse {
                messages: Vec::new(),
            }))
        }
        Err(e) => return Err(port_error(e)),
    };
    let messages = app_state
        .db
        .list_messages(chat_id)
        .await
        .map_err(port_error)?;
    Ok(Json(MessagesResponse {
        messages: messages.into_iter().map(MessageView::from).collect(),
    }))
}

/// Marks or unmarks a chat as favorite.
#[utoipa::path(
    patch,
    path = "/api/chat/{id}",
    params(("id" = Uuid, Path, description = "Chat id")),
    request_body = UpdateChatRequest,
    responses(
        (status = 200, description = "Chat updated", body = SuccessResponse),
        (status = 403, description = "Chat belongs to another user", body = ErrorBody),
        (status = 404, description = "Chat not found", body = ErrorBody)
    )
)]
pub async fn update_chat_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<UpdateChatRequest>,
) -> Result<Json<SuccessResponse>, HttpError> {
    owned_chat(&app_state, chat_id, &user_id).await?;
    app_state
        .db
        .set_favorite(chat_id, req.favorite)
        .await
        .map_err(port_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Deletes a chat and all of its messages.
#[utoipa::path(
    delete,
    path = "/api/chat/{id}",
    params(("id" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Chat deleted", body = SuccessResponse),
        (status = 403, description = "Chat belongs to another user", body = ErrorBody),
        (status = 404, description = "Chat not found", body = ErrorBody)
    )
)]
pub async fn delete_chat_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, HttpError> {
    owned_chat(&app_state, chat_id, &user_id).await?;
    app_state.db.delete_chat(chat_id).await.map_err(port_error)?;
    info!(%chat_id, "Deleted chat.");
    Ok(Json(SuccessResponse { success: true }))
}

/// Rates an assistant message. The latest rating replaces any earlier one.
#[utoipa::path(
    patch,
    path = "/api/messages/{id}/feedback",
    params(("id" = Uuid, Path, description = "Message id")),
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback stored", body = SuccessResponse),
        (status = 400, description = "Unknown feedback value", body = ErrorBody),
        (status = 404, description = "Message not found", body = ErrorBody)
    )
)]
pub async fn feedback_handler(
    State(app_state): State<Arc<AppState>>,
    Path(message_id): Path<Uuid>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<SuccessResponse>, HttpError> {
    let feedback = req
        .feedback
        .as_deref()
        .map(str::parse::<Feedback>)
        .transpose()
        .map_err(port_error)?;
    app_state
        .db
        .set_feedback(message_id, feedback, req.user_comment.as_deref())
        .await
        .map_err(port_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Lists rated assistant answers of the signed-in user, each paired with its question.
#[utoipa::path(
    get,
    path = "/api/ai-performance",
    params(PerformanceQuery),
    responses(
        (status = 200, description = "Rated answers", body = PerformanceResponse),
        (status = 400, description = "Unknown type filter", body = ErrorBody)
    )
)]
pub async fn ai_performance_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    Query(query): Query<PerformanceQuery>,
) -> Result<Json<PerformanceResponse>, HttpError> {
    let only = match query.kind.as_deref() {
        None | Some("all") => None,
        Some(kind) => Some(kind.parse::<Feedback>().map_err(port_error)?),
    };
    let messages = app_state
        .db
        .list_messages_for_owner(&user_id)
        .await
        .map_err(port_error)?;
    let entries = pairing::feedback_entries(&messages, only);
    Ok(Json(PerformanceResponse {
        messages: entries.into_iter().map(PerformanceEntry::from).collect(),
    }))
}

/// Fallback for unknown routes under the API.
pub async fn not_found_handler() -> impl IntoResponse {
    http_error(StatusCode::NOT_FOUND, "Not found")
}
