//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use chat_studio_core::ports::{
    CompletionRequest, CompletionService, DatabaseService, TitleGenerationService,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::title_llm::DEFAULT_TITLE;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    /// Either the HTTP gateway or the canned mock, chosen at startup.
    pub completion: Arc<dyn CompletionService>,
    pub title_adapter: Arc<dyn TitleGenerationService>,
}

impl AppState {
    /// A completion request carrying the configured chat-turn budget.
    pub fn completion_request(&self, prompt: impl Into<String>) -> CompletionRequest {
        CompletionRequest::new(prompt, self.config.ai_max_tokens, self.config.ai_temperature)
    }

    /// A title for a new chat. Never fails, and never holds the turn up for
    /// longer than the configured title timeout.
    pub async fn chat_title(&self, first_message: &str) -> String {
        let titled = tokio::time::timeout(
            self.config.title_timeout,
            self.title_adapter.generate_title(first_message),
        )
        .await;
        match titled {
            Ok(Ok(title)) => title,
            Ok(Err(e)) => {
                debug!("Falling back to the default chat title: {}", e);
                DEFAULT_TITLE.to_string()
            }
            Err(_) => {
                warn!(
                    "Title generation took longer than {:?}, using the default title",
                    self.config.title_timeout
                );
                DEFAULT_TITLE.to_string()
            }
        }
    }
}
