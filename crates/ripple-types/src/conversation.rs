//! Conversation identity types.
//!
//! A conversation groups all messages between a set of participants. Handles
//! are created server-side by the conversation directory on first contact
//! and are stable for the conversation's lifetime; the client never deletes
//! one.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::participant::Participant;

/// Opaque, stable identifier for a conversation.
///
/// The server assigns these; the client only passes them back. Wrapping the
/// raw string keeps conversation ids from being confused with participant
/// ids at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHandle(String);

impl ConversationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConversationHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConversationHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One row of the conversation list the directory returns for a user.
///
/// `last_message` is a denormalized preview maintained by the server;
/// it is display-only and never fed into the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Handle of the conversation.
    pub handle: ConversationHandle,
    /// The other party in a two-party conversation.
    pub peer: Participant,
    /// Preview of the most recent message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantId;

    #[test]
    fn test_handle_serde_transparent() {
        let handle = ConversationHandle::new("66b2f0c4e1a9");
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, "\"66b2f0c4e1a9\"");
        let parsed: ConversationHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, handle);
    }

    #[test]
    fn test_handle_display() {
        let handle = ConversationHandle::from("abc123");
        assert_eq!(handle.to_string(), "abc123");
        assert_eq!(handle.as_str(), "abc123");
    }

    #[test]
    fn test_summary_serde_omits_empty_preview() {
        let summary = ConversationSummary {
            handle: ConversationHandle::new("c1"),
            peer: Participant {
                id: ParticipantId::new("u2"),
                display_name: "mira".to_string(),
                avatar: None,
                bio: None,
            },
            last_message: None,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("last_message"));

        let parsed: ConversationSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.peer.display_name, "mira");
    }
}
