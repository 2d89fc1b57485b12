//! services/api/src/adapters/title_llm.rs
//!
//! Summarizes the first message of a chat into a short title.

use async_trait::async_trait;
use chat_studio_core::ports::{
    CompletionRequest, CompletionService, PortError, PortResult, TitleGenerationService,
};
use std::sync::Arc;

/// Used whenever no usable title can be generated.
pub const DEFAULT_TITLE: &str = "New Chat";

const TITLE_MAX_TOKENS: u32 = 20;
const TITLE_TEMPERATURE: f32 = 0.7;
const PREVIEW_CHARS: usize = 100;

/// An adapter that implements `TitleGenerationService` on top of any
/// completion backend.
#[derive(Clone)]
pub struct CompletionTitleAdapter {
    completion: Arc<dyn CompletionService>,
}

impl CompletionTitleAdapter {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }
}

pub fn title_prompt(first_message: &str) -> String {
    let preview: String = first_message.chars().take(PREVIEW_CHARS).collect();
    format!(
        "Generate a short 3-5 word title for a chat that starts with: \"{}\". \
         Only return the title, nothing else.",
        preview
    )
}

/// Strips whitespace and surrounding quotes from a generated title.
pub fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

#[async_trait]
impl TitleGenerationService for CompletionTitleAdapter {
    async fn generate_title(&self, first_message: &str) -> PortResult<String> {
        let request = CompletionRequest::new(
            title_prompt(first_message),
            TITLE_MAX_TOKENS,
            TITLE_TEMPERATURE,
        );
        let raw = self.completion.complete(&request).await?;

        let title = clean_title(&raw);
        if title.is_empty() {
            return Err(PortError::Unexpected("No title generated".to_string()));
        }
        Ok(title)
    }
}
