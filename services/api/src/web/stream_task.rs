//! services/api/src/web/stream_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for
//! relaying a single chat turn: streaming the completion to the client,
//! materializing side effects, and persisting the assistant message.

use crate::web::{error::public_message, protocol::StreamEvent, state::AppState};
use chat_studio_core::{
    domain::{Message, Role},
    intent::Intent,
    materializer::{self, Materialization},
    ports::{PortError, PortResult},
    slug::generate_slug,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Where a turn is in its lifecycle. `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Start,
    Streaming,
    Finalizing,
    Done,
    Error,
}

impl TurnPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnPhase::Done | TurnPhase::Error)
    }

    fn can_enter(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        matches!(
            (self, next),
            (Start, Streaming)
                | (Streaming, Finalizing)
                | (Finalizing, Done)
                | (Start | Streaming | Finalizing, Error)
        )
    }
}

/// The sending half of a turn's event stream.
///
/// It tracks the turn's phase and refuses events that the phase does not
/// allow, so a client never sees anything after `done` or `error`.
pub struct EventSink {
    sender: mpsc::Sender<StreamEvent>,
    chat_id: Uuid,
    phase: TurnPhase,
}

impl EventSink {
    pub fn new(sender: mpsc::Sender<StreamEvent>, chat_id: Uuid) -> Self {
        Self {
            sender,
            chat_id,
            phase: TurnPhase::Start,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    fn enter(&mut self, next: TurnPhase) -> bool {
        if !self.phase.can_enter(next) {
            warn!(
                chat_id = %self.chat_id,
                "Ignoring turn transition {:?} -> {:?}",
                self.phase,
                next
            );
            return false;
        }
        info!(chat_id = %self.chat_id, "Turn phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
        true
    }

    /// Returns `false` once the client has gone away.
    async fn send(&self, event: StreamEvent) -> bool {
        self.sender.send(event).await.is_ok()
    }

    /// Announces the chat id. Only valid before streaming begins.
    pub async fn start(&mut self) -> bool {
        if self.phase != TurnPhase::Start {
            return false;
        }
        self.send(StreamEvent::Start {
            chat_id: self.chat_id,
        })
        .await
    }

    pub fn begin_streaming(&mut self) -> bool {
        self.enter(TurnPhase::Streaming)
    }

    pub async fn chunk(&mut self, content: String) -> bool {
        if self.phase != TurnPhase::Streaming {
            return false;
        }
        self.send(StreamEvent::Chunk { content }).await
    }

    pub fn begin_finalizing(&mut self) -> bool {
        self.enter(TurnPhase::Finalizing)
    }

    pub async fn done(&mut self, full_content: Option<String>, message_id: Option<Uuid>) -> bool {
        if !self.enter(TurnPhase::Done) {
            return false;
        }
        self.send(StreamEvent::Done {
            full_content,
            message_id,
        })
        .await
    }

    pub async fn fail(&mut self, e: &PortError) -> bool {
        error!(chat_id = %self.chat_id, "Chat turn failed: {:?}", e);
        if !self.enter(TurnPhase::Error) {
            return false;
        }
        self.send(StreamEvent::Error {
            error: public_message(e),
        })
        .await
    }
}

/// Everything the relay needs to know about an accepted turn. The chat and
/// the user message are already persisted.
#[derive(Debug, Clone)]
pub struct Turn {
    pub chat_id: Uuid,
    pub owner_id: String,
    pub intent: Intent,
    /// The prompt actually sent to the completion backend.
    pub prompt: String,
}

/// The main asynchronous task for relaying one chat turn.
///
/// Ends early, persisting nothing further, if `cancellation_token` fires or
/// the client stops reading events.
pub async fn relay_turn(
    app_state: Arc<AppState>,
    turn: Turn,
    mut sink: EventSink,
    cancellation_token: CancellationToken,
) {
    if !sink.start().await {
        return;
    }

    sink.begin_streaming();
    let request = app_state.completion_request(turn.prompt.clone());
    let opened = tokio::select! {
        _ = cancellation_token.cancelled() => {
            info!(chat_id = %turn.chat_id, "Turn cancelled before the completion started.");
            return;
        }
        opened = app_state.completion.complete_streaming(&request) => opened,
    };
    let mut deltas = match opened {
        Ok(deltas) => deltas,
        Err(e) => {
            sink.fail(&e).await;
            return;
        }
    };

    let mut full_text = String::new();
    loop {
        let next = tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!(chat_id = %turn.chat_id, "Turn cancelled while streaming.");
                return;
            }
            next = deltas.next() => next,
        };
        match next {
            Some(Ok(delta)) => {
                full_text.push_str(&delta);
                if !sink.chunk(delta).await {
                    info!(chat_id = %turn.chat_id, "Client went away, abandoning turn.");
                    return;
                }
            }
            Some(Err(e)) => {
                sink.fail(&e).await;
                return;
            }
            None => break,
        }
    }
    drop(deltas);

    sink.begin_finalizing();
    if full_text.is_empty() {
        warn!(chat_id = %turn.chat_id, "Completion produced no text; nothing to persist.");
        sink.done(None, None).await;
        return;
    }

    match finalize_turn(&app_state, &turn, &full_text).await {
        Ok(message) => {
            sink.done(Some(message.content), Some(message.id)).await;
        }
        Err(e) => {
            sink.fail(&e).await;
        }
    }
}

/// Materializes any side effect of the turn and persists the assistant message.
pub async fn finalize_turn(
    app_state: &AppState,
    turn: &Turn,
    full_text: &str,
) -> PortResult<Message> {
    let content = materialize(app_state, &turn.owner_id, turn.intent, full_text).await?;
    app_state
        .db
        .append_message(turn.chat_id, Role::Assistant, &content)
        .await
}

/// Returns the visible content of the turn after creating any blog or product.
async fn materialize(
    app_state: &AppState,
    owner_id: &str,
    intent: Intent,
    full_text: &str,
) -> PortResult<String> {
    match materializer::plan(intent, full_text) {
        Materialization::Passthrough => Ok(full_text.to_string()),
        Materialization::Blog(draft) => {
            let slug = generate_slug(&draft.title);
            let blog = app_state.db.create_blog(owner_id, &draft, &slug).await?;
            info!(blog_id = %blog.id, slug = %blog.slug, "Blog created from chat turn.");
            let url = materializer::blog_url(&app_state.config.public_base_url, &blog.slug);
            Ok(materializer::blog_confirmation(&blog, &url))
        }
        Materialization::Product(draft) => {
            let product = app_state.db.create_product(owner_id, &draft).await?;
            info!(product_id = %product.id, "Product created from chat turn.");
            Ok(materializer::product_confirmation(&product))
        }
        Materialization::Unparsed(failure) => {
            warn!("Could not materialize {:?} turn: {}", intent, failure);
            Ok(materializer::annotate_unparsed(full_text, intent))
        }
    }
}
