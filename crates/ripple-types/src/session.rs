//! Session state types for an open conversation.
//!
//! Exactly one session is live per visible conversation. These types are
//! what the presentation sink consumes: the session phase, the connection
//! status, and the ordered timeline of entries with their delivery state.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::message::Message;

/// Lifecycle phase of a session.
///
/// `Idle -> Loading -> Live <-> Reconnecting -> Closed`. The session only
/// becomes `Live` once history has been applied *and* the transport is open
/// with the conversation's room joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Loading,
    Live,
    Reconnecting,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Loading => write!(f, "loading"),
            SessionPhase::Live => write!(f, "live"),
            SessionPhase::Reconnecting => write!(f, "reconnecting"),
            SessionPhase::Closed => write!(f, "closed"),
        }
    }
}

/// Status of the underlying event connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

/// Whether a timeline entry has been confirmed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Optimistic local echo, awaiting the server's broadcast.
    Pending,
    /// Seen in history or confirmed by a live event.
    Confirmed,
}

/// One entry of the rendered timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub message: Message,
    pub delivery: DeliveryState,
}

impl TimelineEntry {
    pub fn confirmed(message: Message) -> Self {
        Self {
            message,
            delivery: DeliveryState::Confirmed,
        }
    }

    pub fn pending(message: Message) -> Self {
        Self {
            message,
            delivery: DeliveryState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.delivery == DeliveryState::Pending
    }
}

/// Events published on the session bus for the presentation sink.
///
/// The sink receives the full ordered timeline on every change -- snapshots,
/// not deltas, so a late subscriber can render from the next event alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session moved to a new phase.
    PhaseChanged { phase: SessionPhase },
    /// The timeline changed (history applied, entry appended or confirmed).
    TimelineUpdated { timeline: Vec<TimelineEntry> },
}
