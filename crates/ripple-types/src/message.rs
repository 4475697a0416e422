//! Message types for Ripple conversations.
//!
//! A [`Message`] is the unit the reconciler works with. Two flavors exist at
//! runtime: server-confirmed messages (id and created_at assigned by the
//! server) and provisional local echoes (neither assigned yet). The same
//! struct models both -- the optional fields are simply absent until
//! confirmation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::ConversationHandle;
use crate::participant::ParticipantId;

/// A single chat message within a conversation.
///
/// Ordering key is `created_at`, with arrival order as tie-break for
/// messages that lack a server timestamp. The timeline itself is kept in
/// append order and never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned id; absent until the message is confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Who sent the message.
    pub sender_id: ParticipantId,
    /// Message body. Must be non-empty at send time.
    pub content: String,
    /// Server-assigned creation time; absent on provisional entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationHandle,
    /// Client-generated correlation id attached to optimistic sends.
    ///
    /// Servers that echo it back enable exact reconciliation of the local
    /// echo; without it the reconciler falls back to content matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl Message {
    /// Build a provisional local message, before any server round-trip.
    ///
    /// Assigns a fresh UUIDv7 correlation id; id and created_at stay empty
    /// until a matching live event confirms the entry.
    pub fn provisional(
        conversation_id: ConversationHandle,
        sender_id: ParticipantId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            sender_id,
            content: content.into(),
            created_at: None,
            conversation_id,
            correlation_id: Some(Uuid::now_v7()),
        }
    }

    /// Whether the server has confirmed this message.
    pub fn is_confirmed(&self) -> bool {
        self.id.is_some()
    }
}
