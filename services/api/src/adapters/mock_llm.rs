//! services/api/src/adapters/mock_llm.rs
//!
//! A stand-in completion backend used when no real endpoint is configured.
//! It lets the chat stream work end to end during development.

use async_trait::async_trait;
use chat_studio_core::ports::{
    CompletionRequest, CompletionService, PortError, PortResult, TokenStream,
};
use std::time::Duration;

use super::completion::simulate_typing;

pub const MOCK_RESPONSE: &str = "I'm a mock AI response. Please configure AI_MODEL_URL and \
AI_API_SECRET to use the real AI.";

const MOCK_TYPING_DELAY: Duration = Duration::from_millis(50);

/// Streams a canned reply; refuses single-shot completions.
#[derive(Clone, Debug)]
pub struct MockCompletionAdapter {
    typing_delay: Duration,
}

impl MockCompletionAdapter {
    pub fn new() -> Self {
        Self {
            typing_delay: MOCK_TYPING_DELAY,
        }
    }

    pub fn with_typing_delay(typing_delay: Duration) -> Self {
        Self { typing_delay }
    }
}

impl Default for MockCompletionAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for MockCompletionAdapter {
    async fn complete(&self, _request: &CompletionRequest) -> PortResult<String> {
        Err(PortError::Configuration(
            "AI_MODEL_URL and AI_API_SECRET must be set".to_string(),
        ))
    }

    async fn complete_streaming(&self, _request: &CompletionRequest) -> PortResult<TokenStream> {
        Ok(simulate_typing(MOCK_RESPONSE.to_string(), self.typing_delay))
    }
}
