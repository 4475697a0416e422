//! The session reconciler state machine.
//!
//! Merges three inputs into one ordered, deduplicated, append-only
//! timeline: the fetched durable history, live room events, and locally
//! originated optimistic sends. Pure and synchronous -- all IO lives in
//! [`super::sync::SessionSync`] -- so every transition is unit-testable.
//!
//! Phase diagram:
//!
//! ```text
//! Idle -> Loading -> Live <-> Reconnecting
//!                      \________________\-> Closed
//! ```
//!
//! `Live` requires both the applied history and a ready transport (open
//! connection, room joined). History application always happens-before any
//! live event application: live events arriving in any other phase are
//! dropped, and there is no gap-filling replay after a reconnect.

use std::collections::VecDeque;

use ripple_types::conversation::ConversationHandle;
use ripple_types::error::SendError;
use ripple_types::message::Message;
use ripple_types::participant::ParticipantId;
use ripple_types::session::{DeliveryState, SessionPhase, TimelineEntry};
use tracing::{debug, trace};
use uuid::Uuid;

/// Reconciles history, live events, and local sends for one conversation.
///
/// The local sender id is an explicit constructor parameter -- never read
/// from ambient state -- so the reconciler is independently testable.
pub struct Reconciler {
    self_id: ParticipantId,
    handle: Option<ConversationHandle>,
    /// Bumped on every `begin`; history results carry the epoch they were
    /// requested under, and stale ones are discarded.
    epoch: u64,
    phase: SessionPhase,
    history_applied: bool,
    transport_ready: bool,
    timeline: Vec<TimelineEntry>,
    /// Correlation ids of unresolved optimistic sends, in submission order.
    pending: VecDeque<Uuid>,
}

impl Reconciler {
    pub fn new(self_id: ParticipantId) -> Self {
        Self {
            self_id,
            handle: None,
            epoch: 0,
            phase: SessionPhase::Idle,
            history_applied: false,
            transport_ready: false,
            timeline: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Current session phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The ordered timeline, in append order.
    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    /// The active conversation, if any.
    pub fn handle(&self) -> Option<&ConversationHandle> {
        self.handle.as_ref()
    }

    /// Number of unresolved optimistic sends.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Start (or restart) a session for a conversation.
    ///
    /// Clears the timeline, invalidates any in-flight history fetch for a
    /// previous handle, and enters `Loading`. Returns the epoch the caller
    /// must pass back with the history result.
    pub fn begin(&mut self, handle: ConversationHandle) -> u64 {
        self.epoch += 1;
        self.handle = Some(handle);
        self.history_applied = false;
        self.timeline.clear();
        self.pending.clear();
        self.phase = SessionPhase::Loading;
        self.epoch
    }

    /// Apply a fetched history, replacing the timeline.
    ///
    /// Returns false (and changes nothing) when `epoch` is stale -- the
    /// conversation was switched while the fetch was in flight -- or the
    /// session is closed. An empty history is applied normally.
    pub fn apply_history(&mut self, epoch: u64, messages: Vec<Message>) -> bool {
        if epoch != self.epoch || self.phase == SessionPhase::Closed {
            debug!(epoch, current = self.epoch, "discarding stale history result");
            return false;
        }
        self.timeline = messages.into_iter().map(TimelineEntry::confirmed).collect();
        self.history_applied = true;
        self.maybe_go_live();
        true
    }

    /// Apply a live event received for the joined room.
    ///
    /// Appends the message unless it resolves a pending optimistic send
    /// (see [`Self::resolve_pending`]). Events for another conversation, or
    /// arriving in any phase other than `Live`, are dropped -- history
    /// application happens-before live application, and missed events are
    /// never backfilled. Returns whether the timeline changed.
    pub fn apply_live(&mut self, message: Message) -> bool {
        if self.phase != SessionPhase::Live {
            trace!(phase = %self.phase, "dropping live event outside Live phase");
            return false;
        }
        if self.handle.as_ref() != Some(&message.conversation_id) {
            trace!(conversation = %message.conversation_id, "dropping live event for inactive conversation");
            return false;
        }

        if message.sender_id == self.self_id {
            if let Some(index) = self.resolve_pending(&message) {
                let entry = &mut self.timeline[index];
                entry.message.id = message.id;
                entry.message.created_at = message.created_at;
                entry.delivery = DeliveryState::Confirmed;
                return true;
            }
        }

        self.timeline.push(TimelineEntry::confirmed(message));
        true
    }

    /// Optimistically append a local send.
    ///
    /// Returns the provisional message (carrying a fresh correlation id)
    /// for the caller to publish and persist in parallel. The entry is
    /// resolved in place when the server's room broadcast echoes it back;
    /// it is never removed.
    pub fn submit_local(&mut self, content: &str) -> Result<Message, SendError> {
        if content.trim().is_empty() {
            return Err(SendError::EmptyContent);
        }
        if !matches!(self.phase, SessionPhase::Live | SessionPhase::Reconnecting) {
            return Err(SendError::NotLive);
        }
        // Live/Reconnecting imply begin() ran, so a handle exists.
        let handle = match self.handle.clone() {
            Some(handle) => handle,
            None => return Err(SendError::NotLive),
        };

        let message = Message::provisional(handle, self.self_id.clone(), content);
        if let Some(correlation_id) = message.correlation_id {
            self.pending.push_back(correlation_id);
        }
        self.timeline.push(TimelineEntry::pending(message.clone()));
        Ok(message)
    }

    /// The transport dropped. `Live` degrades to `Reconnecting`; the
    /// timeline is preserved across the gap.
    pub fn transport_down(&mut self) {
        self.transport_ready = false;
        if self.phase == SessionPhase::Live {
            self.phase = SessionPhase::Reconnecting;
        }
    }

    /// The transport is open and the conversation's room is joined.
    pub fn transport_up(&mut self) {
        self.transport_ready = true;
        self.maybe_go_live();
    }

    /// Tear the session down. Terminal.
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    fn maybe_go_live(&mut self) {
        if self.history_applied
            && self.transport_ready
            && matches!(
                self.phase,
                SessionPhase::Loading | SessionPhase::Reconnecting
            )
        {
            self.phase = SessionPhase::Live;
        }
    }

    /// Find the timeline index of the pending entry a self-echo resolves.
    ///
    /// Correlation-id match wins when the server echoes one; otherwise the
    /// original content heuristic applies: earliest pending entry with
    /// byte-equal content. Returns None when nothing matches (the event is
    /// a genuinely new message from this sender, e.g. another device).
    fn resolve_pending(&mut self, message: &Message) -> Option<usize> {
        let pos = message
            .correlation_id
            .and_then(|cid| self.pending.iter().position(|&c| c == cid))
            .or_else(|| {
                self.pending.iter().position(|&c| {
                    self.timeline.iter().any(|e| {
                        e.is_pending()
                            && e.message.correlation_id == Some(c)
                            && e.message.content == message.content
                    })
                })
            })?;
        let correlation_id = self.pending.remove(pos)?;
        self.timeline
            .iter()
            .position(|e| e.is_pending() && e.message.correlation_id == Some(correlation_id))
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("phase", &self.phase)
            .field("epoch", &self.epoch)
            .field("timeline_len", &self.timeline.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ripple_types::session::DeliveryState;

    fn handle() -> ConversationHandle {
        ConversationHandle::new("c1")
    }

    fn confirmed(id: &str, sender: &str, content: &str) -> Message {
        Message {
            id: Some(id.to_string()),
            sender_id: ParticipantId::new(sender),
            content: content.to_string(),
            created_at: Some(Utc::now()),
            conversation_id: handle(),
            correlation_id: None,
        }
    }

    fn live_reconciler() -> Reconciler {
        let mut r = Reconciler::new(ParticipantId::new("u1"));
        let epoch = r.begin(handle());
        r.transport_up();
        assert!(r.apply_history(epoch, vec![]));
        assert_eq!(r.phase(), SessionPhase::Live);
        r
    }

    #[test]
    fn starts_idle() {
        let r = Reconciler::new(ParticipantId::new("u1"));
        assert_eq!(r.phase(), SessionPhase::Idle);
        assert!(r.timeline().is_empty());
        assert!(r.handle().is_none());
    }

    #[test]
    fn begin_enters_loading() {
        let mut r = Reconciler::new(ParticipantId::new("u1"));
        r.begin(handle());
        assert_eq!(r.phase(), SessionPhase::Loading);
        assert_eq!(r.handle(), Some(&handle()));
    }

    #[test]
    fn live_requires_history_and_transport() {
        let mut r = Reconciler::new(ParticipantId::new("u1"));
        let epoch = r.begin(handle());

        // History alone is not enough.
        assert!(r.apply_history(epoch, vec![confirmed("m1", "u2", "hi")]));
        assert_eq!(r.phase(), SessionPhase::Loading);

        r.transport_up();
        assert_eq!(r.phase(), SessionPhase::Live);
        assert_eq!(r.timeline().len(), 1);
    }

    #[test]
    fn empty_history_goes_live_not_error() {
        let mut r = Reconciler::new(ParticipantId::new("u1"));
        let epoch = r.begin(handle());
        r.transport_up();
        assert!(r.apply_history(epoch, vec![]));
        assert_eq!(r.phase(), SessionPhase::Live);
        assert!(r.timeline().is_empty());
    }

    #[test]
    fn stale_history_is_discarded_after_switch() {
        let mut r = Reconciler::new(ParticipantId::new("u1"));
        let epoch_a = r.begin(ConversationHandle::new("A"));
        let epoch_b = r.begin(ConversationHandle::new("B"));
        r.transport_up();

        // A's fetch resolves after the switch to B: must never appear.
        assert!(!r.apply_history(epoch_a, vec![confirmed("m1", "u2", "from A")]));
        assert!(r.timeline().is_empty());
        assert_eq!(r.phase(), SessionPhase::Loading);

        assert!(r.apply_history(epoch_b, vec![confirmed("m2", "u2", "from B")]));
        assert_eq!(r.timeline().len(), 1);
        assert_eq!(r.timeline()[0].message.content, "from B");
    }

    #[test]
    fn live_events_preserve_delivery_order_regardless_of_timestamps() {
        let mut r = live_reconciler();

        let mut m1 = confirmed("m1", "u2", "first");
        let mut m2 = confirmed("m2", "u2", "second");
        let mut m3 = confirmed("m3", "u2", "third");
        // Deliberately non-monotonic timestamps.
        m1.created_at = Some(Utc::now());
        m2.created_at = Some(Utc::now() - chrono::Duration::minutes(5));
        m3.created_at = Some(Utc::now() - chrono::Duration::minutes(10));

        assert!(r.apply_live(m1));
        assert!(r.apply_live(m2));
        assert!(r.apply_live(m3));

        let contents: Vec<_> = r
            .timeline()
            .iter()
            .map(|e| e.message.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn live_event_before_live_phase_is_dropped() {
        let mut r = Reconciler::new(ParticipantId::new("u1"));
        r.begin(handle());
        assert!(!r.apply_live(confirmed("m1", "u2", "too early")));
        assert!(r.timeline().is_empty());
    }

    #[test]
    fn live_event_for_other_conversation_is_dropped() {
        let mut r = live_reconciler();
        let mut msg = confirmed("m1", "u2", "hello");
        msg.conversation_id = ConversationHandle::new("other");
        assert!(!r.apply_live(msg));
        assert!(r.timeline().is_empty());
    }

    #[test]
    fn submit_rejects_empty_content() {
        let mut r = live_reconciler();
        assert!(matches!(r.submit_local("  "), Err(SendError::EmptyContent)));
        assert!(matches!(r.submit_local(""), Err(SendError::EmptyContent)));
        assert!(r.timeline().is_empty());
    }

    #[test]
    fn submit_rejects_before_live() {
        let mut r = Reconciler::new(ParticipantId::new("u1"));
        r.begin(handle());
        assert!(matches!(r.submit_local("hello"), Err(SendError::NotLive)));
    }

    #[test]
    fn submit_appends_pending_entry() {
        let mut r = live_reconciler();
        let msg = r.submit_local("hello").unwrap();
        assert!(msg.correlation_id.is_some());
        assert!(msg.id.is_none());
        assert_eq!(r.timeline().len(), 1);
        assert!(r.timeline()[0].is_pending());
        assert_eq!(r.pending_count(), 1);
    }

    #[test]
    fn echo_resolves_pending_by_content() {
        let mut r = live_reconciler();
        r.submit_local("hello").unwrap();

        // Server echo without a correlation id (original wire contract).
        let echo = confirmed("m1", "u1", "hello");
        assert!(r.apply_live(echo));

        assert_eq!(r.timeline().len(), 1, "echo must not duplicate the entry");
        let entry = &r.timeline()[0];
        assert_eq!(entry.delivery, DeliveryState::Confirmed);
        assert_eq!(entry.message.id.as_deref(), Some("m1"));
        assert!(entry.message.created_at.is_some());
        assert_eq!(r.pending_count(), 0);
    }

    #[test]
    fn echo_resolves_pending_by_correlation_id() {
        let mut r = live_reconciler();
        let sent = r.submit_local("hello").unwrap();

        let mut echo = confirmed("m1", "u1", "hello");
        echo.correlation_id = sent.correlation_id;
        assert!(r.apply_live(echo));

        assert_eq!(r.timeline().len(), 1);
        assert_eq!(r.timeline()[0].message.id.as_deref(), Some("m1"));
    }

    #[test]
    fn identical_rapid_sends_resolve_earliest_first() {
        let mut r = live_reconciler();
        r.submit_local("hi").unwrap();
        r.submit_local("hi").unwrap();
        assert_eq!(r.pending_count(), 2);

        assert!(r.apply_live(confirmed("m1", "u1", "hi")));
        assert_eq!(r.timeline()[0].delivery, DeliveryState::Confirmed);
        assert!(r.timeline()[1].is_pending());

        assert!(r.apply_live(confirmed("m2", "u1", "hi")));
        assert_eq!(r.timeline()[1].delivery, DeliveryState::Confirmed);
        assert_eq!(r.pending_count(), 0);
        assert_eq!(r.timeline().len(), 2);
    }

    #[test]
    fn correlation_ids_disambiguate_identical_sends() {
        let mut r = live_reconciler();
        let first = r.submit_local("hi").unwrap();
        let second = r.submit_local("hi").unwrap();

        // Echoes arrive out of order; ids still land on the right entries.
        let mut echo2 = confirmed("m2", "u1", "hi");
        echo2.correlation_id = second.correlation_id;
        assert!(r.apply_live(echo2));
        assert!(r.timeline()[0].is_pending());
        assert_eq!(r.timeline()[1].message.id.as_deref(), Some("m2"));

        let mut echo1 = confirmed("m1", "u1", "hi");
        echo1.correlation_id = first.correlation_id;
        assert!(r.apply_live(echo1));
        assert_eq!(r.timeline()[0].message.id.as_deref(), Some("m1"));
    }

    #[test]
    fn self_message_without_pending_match_appends() {
        // Same sender from another device: no pending entry matches.
        let mut r = live_reconciler();
        assert!(r.apply_live(confirmed("m1", "u1", "from elsewhere")));
        assert_eq!(r.timeline().len(), 1);
        assert_eq!(r.timeline()[0].delivery, DeliveryState::Confirmed);
    }

    #[test]
    fn peer_message_with_same_content_as_pending_appends() {
        // Dedup is scoped to the local sender; a peer echoing the same
        // text is a distinct message.
        let mut r = live_reconciler();
        r.submit_local("hello").unwrap();
        assert!(r.apply_live(confirmed("m1", "u2", "hello")));
        assert_eq!(r.timeline().len(), 2);
        assert!(r.timeline()[0].is_pending());
    }

    #[test]
    fn disconnect_enters_reconnecting_and_preserves_timeline() {
        let mut r = live_reconciler();
        r.submit_local("hello").unwrap();

        r.transport_down();
        assert_eq!(r.phase(), SessionPhase::Reconnecting);
        assert_eq!(r.timeline().len(), 1);

        // Rejoin: back to Live without refetching history, no backfill.
        r.transport_up();
        assert_eq!(r.phase(), SessionPhase::Live);
        assert_eq!(r.timeline().len(), 1);
    }

    #[test]
    fn submit_allowed_while_reconnecting() {
        let mut r = live_reconciler();
        r.transport_down();
        assert!(r.submit_local("still here").is_ok());
        assert_eq!(r.timeline().len(), 1);
    }

    #[test]
    fn unresolved_pending_send_stays_pending() {
        // No matching echo ever arrives: the entry stays visible and
        // unconfirmed indefinitely.
        let mut r = live_reconciler();
        r.submit_local("hello").unwrap();
        assert!(r.apply_live(confirmed("m1", "u2", "unrelated")));
        assert!(r.timeline()[0].is_pending());
        assert_eq!(r.pending_count(), 1);
    }

    #[test]
    fn close_is_terminal_for_live_events_and_history() {
        let mut r = live_reconciler();
        let epoch = r.begin(handle());
        r.close();
        assert_eq!(r.phase(), SessionPhase::Closed);
        assert!(!r.apply_live(confirmed("m1", "u2", "late")));
        assert!(!r.apply_history(epoch, vec![confirmed("m2", "u2", "late")]));
    }

    #[test]
    fn full_open_scenario() {
        // Open C1 with empty history, submit "hello", receive the echo.
        let mut r = Reconciler::new(ParticipantId::new("U1"));
        let epoch = r.begin(ConversationHandle::new("C1"));
        r.transport_up();
        r.apply_history(epoch, vec![]);
        assert_eq!(r.phase(), SessionPhase::Live);

        r.submit_local("hello").unwrap();
        assert_eq!(r.timeline().len(), 1);
        assert!(r.timeline()[0].is_pending());

        let echo = Message {
            id: Some("m-1".to_string()),
            sender_id: ParticipantId::new("U1"),
            content: "hello".to_string(),
            created_at: Some(Utc::now()),
            conversation_id: ConversationHandle::new("C1"),
            correlation_id: None,
        };
        assert!(r.apply_live(echo));
        assert_eq!(r.timeline().len(), 1);
        assert_eq!(r.timeline()[0].delivery, DeliveryState::Confirmed);
    }
}
