//! Pairs rated assistant answers with the question that prompted them.

use crate::domain::{Feedback, FeedbackEntry, Message, Role};

/// The nearest user message before `index` in the same chat, if any.
fn question_for(messages: &[Message], index: usize) -> Option<&Message> {
    let chat_id = messages.get(index)?.chat_id;
    messages[..index]
        .iter()
        .rev()
        .take_while(|prev| prev.chat_id == chat_id)
        .find(|prev| prev.role == Role::User)
}

/// Collects every assistant message with feedback, optionally restricted to
/// one rating, together with its question.
///
/// `messages` may span several chats; a question is only looked up within the
/// answer's own chat.
pub fn feedback_entries(messages: &[Message], only: Option<Feedback>) -> Vec<FeedbackEntry> {
    messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::Assistant)
        .filter_map(|(i, m)| {
            let rating = m.feedback?;
            if only.is_some_and(|wanted| wanted != rating) {
                return None;
            }
            let question = question_for(messages, i).map(|q| q.content.clone());
            Some(FeedbackEntry {
                message: m.clone(),
                question,
            })
        })
        .collect()
}
