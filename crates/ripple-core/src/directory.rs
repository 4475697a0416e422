//! Conversation directory port.
//!
//! The directory is an external collaborator: it resolves (or creates) the
//! conversation handle for a pair of participants before the session core
//! engages, lists a user's conversations, and serves participant profiles
//! for timeline labels.

use ripple_types::conversation::{ConversationHandle, ConversationSummary};
use ripple_types::error::FetchError;
use ripple_types::participant::{Participant, ParticipantId};

/// Port for conversation resolution and participant lookup.
pub trait ConversationDirectory: Send + Sync {
    /// Resolve the conversation with a peer, creating it on first contact.
    ///
    /// Idempotent: repeated calls for the same pair return the same handle.
    fn get_or_create(
        &self,
        peer: &ParticipantId,
    ) -> impl std::future::Future<Output = Result<ConversationHandle, FetchError>> + Send;

    /// Fetch a participant profile.
    fn participant(
        &self,
        id: &ParticipantId,
    ) -> impl std::future::Future<Output = Result<Participant, FetchError>> + Send;

    /// List the conversations a user is part of.
    fn conversations(
        &self,
        user: &ParticipantId,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSummary>, FetchError>> + Send;
}
