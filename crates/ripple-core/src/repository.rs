//! Message repository port: durable history reads and writes.

use ripple_types::conversation::ConversationHandle;
use ripple_types::error::{FetchError, SendError};
use ripple_types::message::Message;
use ripple_types::participant::ParticipantId;
use uuid::Uuid;

/// Port for the durable message log behind a conversation.
///
/// Implementations live in `ripple-infra` (e.g. `RestClient`).
pub trait MessageRepository: Send + Sync {
    /// Fetch the full message log for a conversation, oldest first.
    ///
    /// A single request: failures are propagated, not retried. A
    /// conversation with no prior messages yields an empty vec, not an
    /// error.
    fn history(
        &self,
        conversation: &ConversationHandle,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, FetchError>> + Send;

    /// Create a message in the durable log.
    ///
    /// The server assigns `id` and `created_at`. The correlation id rides
    /// along so conforming servers can echo it in their room broadcast.
    fn create(
        &self,
        conversation: &ConversationHandle,
        sender: &ParticipantId,
        content: &str,
        correlation_id: Option<Uuid>,
    ) -> impl std::future::Future<Output = Result<Message, SendError>> + Send;
}
