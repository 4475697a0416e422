//! Transport channel port.
//!
//! One bidirectional event connection per client process, with
//! per-conversation rooms joined on top of it. The connection is shared
//! across whichever conversation is currently open; it persists across
//! conversation switches to avoid reconnect cost.

use ripple_types::conversation::ConversationHandle;
use ripple_types::error::ConnectionError;
use ripple_types::event::{ClientEvent, ServerEvent};
use ripple_types::session::ConnectionStatus;
use tokio::sync::broadcast;

/// Notifications surfaced by a transport to its subscribers.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is open and all active rooms have been (re)joined.
    Connected,
    /// The connection dropped; a reconnect is being scheduled.
    Disconnected,
    /// An event received from the server, in receipt order.
    Event(ServerEvent),
}

/// Port for the transport channel manager.
///
/// Implementations live in `ripple-infra` (e.g. the WebSocket transport).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait Transport: Send + Sync {
    /// Establish the underlying connection if not already open. Idempotent.
    ///
    /// On failure the implementation schedules reconnect attempts itself;
    /// callers observe progress through [`Transport::subscribe`].
    fn connect(&self) -> impl std::future::Future<Output = Result<(), ConnectionError>> + Send;

    /// Release the connection. Safe to call multiple times; a subsequent
    /// `connect` creates a fresh connection.
    fn disconnect(&self) -> impl std::future::Future<Output = ()> + Send;

    /// Mark a conversation's room active and send the join signal.
    ///
    /// Joining an already-active room is a no-op. Active rooms are rejoined
    /// automatically after every reconnect, since room membership does not
    /// survive a dropped connection.
    fn join_room(
        &self,
        room: &ConversationHandle,
    ) -> impl std::future::Future<Output = Result<(), ConnectionError>> + Send;

    /// Remove a room from the active set and send the leave signal.
    fn leave_room(
        &self,
        room: &ConversationHandle,
    ) -> impl std::future::Future<Output = Result<(), ConnectionError>> + Send;

    /// Fire-and-forget publish. No delivery acknowledgment is modeled.
    fn publish(
        &self,
        event: ClientEvent,
    ) -> impl std::future::Future<Output = Result<(), ConnectionError>> + Send;

    /// Subscribe to transport notifications, delivered in receipt order.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    /// Current connection status.
    fn status(&self) -> ConnectionStatus;
}
