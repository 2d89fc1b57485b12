//! crates/chat_studio_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    AuthSession, Blog, BlogDraft, Chat, Feedback, Message, Product, ProductDraft, Role, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The endpoint or credential of an external service is not set.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// An external service answered with a non-success status, timed out,
    /// or the connection failed.
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// An ordered sequence of text deltas produced by a completion backend.
pub type TokenStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live session to its user id.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    /// Live sessions of `user_id`, newest first.
    async fn list_auth_sessions(&self, user_id: &str) -> PortResult<Vec<AuthSession>>;

    /// Ends one session, only when it belongs to `user_id`. Returns whether a row went away.
    async fn delete_user_auth_session(&self, user_id: &str, session_id: &str) -> PortResult<bool>;

    /// Ends every session of `user_id`.
    async fn delete_auth_sessions_for_user(&self, user_id: &str) -> PortResult<()>;

    // --- Conversation Store ---
    async fn create_chat(&self, owner_id: &str, title: &str) -> PortResult<Chat>;

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat>;

    /// Chats owned by `owner_id`, most recently updated first.
    async fn list_chats(&self, owner_id: &str) -> PortResult<Vec<Chat>>;

    async fn set_favorite(&self, chat_id: Uuid, favorite: bool) -> PortResult<()>;

    /// Removes a chat together with all of its messages.
    async fn delete_chat(&self, chat_id: Uuid) -> PortResult<()>;

    /// Appends a message and bumps the chat's `updated_at`. The chat must
    /// already exist.
    async fn append_message(&self, chat_id: Uuid, role: Role, content: &str)
        -> PortResult<Message>;

    /// Messages in creation order. Unknown chats yield an empty list.
    async fn list_messages(&self, chat_id: Uuid) -> PortResult<Vec<Message>>;

    /// Overwrites the feedback fields of a message (last write wins).
    async fn set_feedback(
        &self,
        message_id: Uuid,
        feedback: Option<Feedback>,
        user_comment: Option<&str>,
    ) -> PortResult<()>;

    /// Every message of every chat owned by `owner_id`, grouped by chat and
    /// ordered by creation time within each chat.
    async fn list_messages_for_owner(&self, owner_id: &str) -> PortResult<Vec<Message>>;

    // --- Blogs ---
    async fn create_blog(&self, owner_id: &str, draft: &BlogDraft, slug: &str) -> PortResult<Blog>;

    async fn list_blogs(&self) -> PortResult<Vec<Blog>>;

    /// Looks a blog up by its id or, failing that, by its slug.
    async fn find_blog(&self, id_or_slug: &str) -> PortResult<Blog>;

    async fn update_blog(&self, blog_id: Uuid, draft: &BlogDraft) -> PortResult<()>;

    async fn delete_blog(&self, blog_id: Uuid) -> PortResult<()>;

    // --- Products ---
    async fn create_product(&self, owner_id: &str, draft: &ProductDraft) -> PortResult<Product>;

    async fn list_products(&self) -> PortResult<Vec<Product>>;

    async fn update_product(&self, product_id: Uuid, draft: &ProductDraft) -> PortResult<()>;

    async fn delete_product(&self, product_id: Uuid) -> PortResult<()>;
}

/// The parameters of a single completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature,
        }
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Returns the full completion text in one piece.
    async fn complete(&self, request: &CompletionRequest) -> PortResult<String>;

    /// Returns the completion as an ordered stream of text deltas. Errors
    /// that occur before the first delta are returned directly; later ones
    /// are yielded as stream items.
    async fn complete_streaming(&self, request: &CompletionRequest) -> PortResult<TokenStream>;
}

#[async_trait]
pub trait TitleGenerationService: Send + Sync {
    /// Produces a short chat title from the first user message.
    async fn generate_title(&self, first_message: &str) -> PortResult<String>;
}
