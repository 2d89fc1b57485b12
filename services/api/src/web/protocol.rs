//! services/api/src/web/protocol.rs
//!
//! Defines the chat stream protocol between the browser client and the API server.
//!
//! The client opens a turn with a single JSON request. The server answers with
//! an event stream where every event is framed as `data: <json>\n\n`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Opens a chat turn. Fields are optional here so that a missing one is
/// reported as a 400 by the handler rather than a body rejection.
#[derive(Deserialize, Debug, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub message: Option<String>,
    /// Continue an existing chat; a new one is created when absent.
    pub chat_id: Option<String>,
    pub user_id: Option<String>,
    /// An explicit intent tag such as `create-blog`.
    pub context: Option<String>,
}

//=========================================================================================
// Events Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// One event of a chat turn's stream.
///
/// A stream is always `start`, any number of `chunk`s, then exactly one of
/// `done` or `error`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The turn has been accepted; carries the (possibly new) chat id.
    Start {
        #[serde(rename = "chatId")]
        chat_id: Uuid,
    },

    /// A text delta, in the order produced by the completion backend.
    Chunk { content: String },

    /// The assistant message is persisted.
    Done {
        #[serde(rename = "fullContent", skip_serializing_if = "Option::is_none")]
        full_content: Option<String>,
        #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
        message_id: Option<Uuid>,
    },

    /// The turn failed; nothing further follows.
    Error { error: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }

    /// Frames the event for the wire.
    pub fn encode(&self) -> Bytes {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","error":"failed to encode event: {}"}}"#,
                e.to_string().replace('"', "'")
            )
        });
        Bytes::from(format!("data: {}\n\n", json))
    }
}
