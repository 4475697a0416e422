//! Wire events exchanged over the transport channel.
//!
//! Both directions are JSON text frames: internally tagged enums so the
//! frame carries a `type` discriminator. Unknown or malformed frames are
//! logged and ignored by the transport, never fatal.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::ConversationHandle;
use crate::message::Message;
use crate::participant::ParticipantId;

/// Client-to-server events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Scope event delivery to a conversation's room.
    ///
    /// Must be re-issued after every reconnect for rooms still considered
    /// active; membership does not survive a dropped connection.
    JoinRoom { conversation_id: ConversationHandle },
    /// Drop out of a conversation's room.
    LeaveRoom { conversation_id: ConversationHandle },
    /// Fire-and-forget publish of a message to the room.
    ///
    /// No delivery acknowledgment is modeled; the sender's own optimistic
    /// echo plus reconciliation against the server broadcast is the only
    /// confirmation available.
    SendMessage {
        sender_id: ParticipantId,
        content: String,
        conversation_id: ConversationHandle,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<Uuid>,
    },
    /// Keep-alive ping. Server responds with `{"type":"pong"}`.
    Ping,
}

/// Server-to-client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A message delivered to every connected member of the room,
    /// including the sender.
    ReceiveMessage { message: Message },
    /// Keep-alive response.
    Pong,
}
