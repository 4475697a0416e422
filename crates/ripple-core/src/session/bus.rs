//! Broadcast bus for distributing `SessionEvent` to presentation sinks.
//!
//! Built on `tokio::sync::broadcast`, plus a cached copy of the latest
//! session state. The cache serves two jobs: repeated `PhaseChanged`
//! publishes for an unchanged phase are suppressed here, and a subscriber
//! that arrives between mutations can read the current snapshot instead of
//! waiting for the next event.

use std::sync::{Arc, Mutex};

use ripple_types::session::{SessionEvent, SessionPhase, TimelineEntry};
use tokio::sync::broadcast;

/// Multi-consumer bus for session timeline and phase events.
///
/// Cloning the bus shares both the channel and the cached state, allowing
/// multiple producers and consumers.
#[derive(Clone)]
pub struct SessionBus {
    sender: broadcast::Sender<SessionEvent>,
    state: Arc<Mutex<BusState>>,
}

struct BusState {
    phase: SessionPhase,
    timeline: Vec<TimelineEntry>,
}

impl SessionBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            state: Arc::new(Mutex::new(BusState {
                phase: SessionPhase::Idle,
                timeline: Vec::new(),
            })),
        }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Latest phase and timeline, for consumers that missed earlier events.
    pub fn snapshot(&self) -> (SessionPhase, Vec<TimelineEntry>) {
        match self.state.lock() {
            Ok(state) => (state.phase, state.timeline.clone()),
            Err(_) => (SessionPhase::Closed, Vec::new()),
        }
    }

    /// Publish a phase change to all current subscribers.
    ///
    /// Suppressed when the phase has not actually changed, so sinks never
    /// see repeated `PhaseChanged` events. Returns whether it was emitted.
    pub fn publish_phase(&self, phase: SessionPhase) -> bool {
        let changed = match self.state.lock() {
            Ok(mut state) if state.phase != phase => {
                state.phase = phase;
                true
            }
            _ => false,
        };
        if changed {
            let _ = self.sender.send(SessionEvent::PhaseChanged { phase });
        }
        changed
    }

    /// Publish a timeline snapshot, caching it for late consumers.
    ///
    /// If there are no subscribers, the event is silently dropped; the
    /// cache is updated either way.
    pub fn publish_timeline(&self, timeline: Vec<TimelineEntry>) {
        if let Ok(mut state) = self.state.lock() {
            state.timeline = timeline.clone();
        }
        let _ = self.sender.send(SessionEvent::TimelineUpdated { timeline });
    }
}

impl std::fmt::Debug for SessionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
