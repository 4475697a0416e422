//! The session synchronizer driver.
//!
//! [`SessionSync`] is the single logical owner of a [`Reconciler`]: one
//! task multiplexes commands from the handle, transport notifications, and
//! history-fetch completions, so every timeline mutation is serialized on
//! that task. Suspension points (history fetch, durable write) run as
//! spawned tasks and report back as messages; switching conversations
//! cancels the *relevance* of an in-flight fetch (via the reconciler's
//! epoch), not its execution.
//!
//! After every mutation the driver publishes a [`SessionEvent`] snapshot on
//! the [`SessionBus`] -- the whole contract the presentation sink sees.

use std::sync::Arc;

use ripple_types::conversation::ConversationHandle;
use ripple_types::error::{FetchError, SendError};
use ripple_types::event::{ClientEvent, ServerEvent};
use ripple_types::message::Message;
use ripple_types::participant::ParticipantId;
use ripple_types::session::{ConnectionStatus, SessionEvent, SessionPhase, TimelineEntry};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::repository::MessageRepository;
use crate::session::bus::SessionBus;
use crate::session::reconciler::Reconciler;
use crate::transport::{Transport, TransportEvent};

/// Capacity of the session event bus.
const BUS_CAPACITY: usize = 256;
/// Capacity of the command channel.
const COMMAND_CAPACITY: usize = 32;

enum Command {
    Open(ConversationHandle),
    Submit(String, oneshot::Sender<Result<(), SendError>>),
    Close,
}

/// Cloneable handle for driving a running [`SessionSync`].
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    bus: SessionBus,
}

impl SessionHandle {
    /// Open (or switch to) a conversation. Tears down relevance of the
    /// previous one first: its room is left and any in-flight history
    /// fetch is discarded on arrival.
    pub async fn open(&self, conversation: ConversationHandle) {
        let _ = self.command_tx.send(Command::Open(conversation)).await;
    }

    /// Submit a local message on the optimistic path.
    ///
    /// Resolves as soon as the provisional entry is appended; durable write
    /// and live publish continue in the background.
    pub async fn submit(&self, content: impl Into<String>) -> Result<(), SendError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Submit(content.into(), reply_tx))
            .await
            .map_err(|_| SendError::NotLive)?;
        reply_rx.await.map_err(|_| SendError::NotLive)?
    }

    /// Tear the session down: leave the room, detach handlers, close.
    pub async fn close(&self) {
        let _ = self.command_tx.send(Command::Close).await;
    }

    /// Subscribe to session events (phase changes, timeline snapshots).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Latest phase and timeline as cached by the bus, without waiting
    /// for the next event.
    pub fn snapshot(&self) -> (SessionPhase, Vec<TimelineEntry>) {
        self.bus.snapshot()
    }
}

/// Drives one live session over a shared transport and message repository.
///
/// Generic over the [`Transport`] and [`MessageRepository`] ports so the
/// driver can run against in-memory fakes in tests.
pub struct SessionSync<T, M> {
    transport: Arc<T>,
    repository: Arc<M>,
    reconciler: Reconciler,
    bus: SessionBus,
    history_tx: mpsc::Sender<(u64, Result<Vec<Message>, FetchError>)>,
}

impl<T, M> SessionSync<T, M>
where
    T: Transport + 'static,
    M: MessageRepository + 'static,
{
    /// Spawn the driver task and return its handle.
    ///
    /// The local sender id is an explicit parameter -- the driver never
    /// reads identity from ambient state.
    pub fn spawn(
        self_id: ParticipantId,
        transport: Arc<T>,
        repository: Arc<M>,
    ) -> (SessionHandle, tokio::task::JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (history_tx, history_rx) = mpsc::channel(COMMAND_CAPACITY);
        let bus = SessionBus::new(BUS_CAPACITY);

        let sync = SessionSync {
            transport,
            repository,
            reconciler: Reconciler::new(self_id),
            bus: bus.clone(),
            history_tx,
        };
        let task = tokio::spawn(sync.run(command_rx, history_rx));

        (SessionHandle { command_tx, bus }, task)
    }

    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut history_rx: mpsc::Receiver<(u64, Result<Vec<Message>, FetchError>)>,
    ) {
        let mut transport_rx = self.transport.subscribe();

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(Command::Open(conversation)) => self.handle_open(conversation).await,
                        Some(Command::Submit(content, reply)) => {
                            let result = self.handle_submit(content).await;
                            let _ = reply.send(result);
                        }
                        Some(Command::Close) | None => {
                            self.teardown().await;
                            break;
                        }
                    }
                }

                Some((epoch, result)) = history_rx.recv() => {
                    self.handle_history(epoch, result);
                }

                event = transport_rx.recv() => {
                    match event {
                        Ok(TransportEvent::Connected) => {
                            self.reconciler.transport_up();
                            self.publish_phase();
                        }
                        Ok(TransportEvent::Disconnected) => {
                            self.reconciler.transport_down();
                            self.publish_phase();
                        }
                        Ok(TransportEvent::Event(ServerEvent::ReceiveMessage { message })) => {
                            if self.reconciler.apply_live(message) {
                                self.publish_timeline();
                            }
                        }
                        Ok(TransportEvent::Event(_)) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "session fell behind the transport, skipping {n} events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            // Transport dropped entirely (client shutting down).
                            self.reconciler.transport_down();
                            self.publish_phase();
                        }
                    }
                }
            }
        }
    }

    async fn handle_open(&mut self, conversation: ConversationHandle) {
        if let Some(previous) = self.reconciler.handle().cloned() {
            if previous != conversation {
                if let Err(err) = self.transport.leave_room(&previous).await {
                    debug!(conversation = %previous, error = %err, "leave_room failed");
                }
            }
        }

        let epoch = self.reconciler.begin(conversation.clone());
        info!(conversation = %conversation, epoch, "opening session");
        self.publish_phase();
        self.publish_timeline();

        if let Err(err) = self.transport.join_room(&conversation).await {
            warn!(conversation = %conversation, error = %err, "join_room failed");
        }
        if self.transport.status() == ConnectionStatus::Open {
            self.reconciler.transport_up();
        }

        // Fetch history off the owner task; the epoch travels with the
        // result so a post-switch arrival is recognizably stale.
        let repository = Arc::clone(&self.repository);
        let history_tx = self.history_tx.clone();
        tokio::spawn(async move {
            let result = repository.history(&conversation).await;
            let _ = history_tx.send((epoch, result)).await;
        });
    }

    fn handle_history(&mut self, epoch: u64, result: Result<Vec<Message>, FetchError>) {
        match result {
            Ok(messages) => {
                if self.reconciler.apply_history(epoch, messages) {
                    self.publish_timeline();
                    self.publish_phase();
                }
            }
            Err(err) => {
                // Not fatal and not retried: the session stays Loading and
                // the sink keeps showing its loading state.
                warn!(error = %err, "history fetch failed");
            }
        }
    }

    async fn handle_submit(&mut self, content: String) -> Result<(), SendError> {
        let message = self.reconciler.submit_local(&content)?;
        self.publish_timeline();

        // Durable write and live broadcast go out in parallel; neither
        // confirms the entry -- only the room echo does.
        let publish = self.transport.publish(ClientEvent::SendMessage {
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            conversation_id: message.conversation_id.clone(),
            correlation_id: message.correlation_id,
        });

        let repository = Arc::clone(&self.repository);
        tokio::spawn(async move {
            if let Err(err) = repository
                .create(
                    &message.conversation_id,
                    &message.sender_id,
                    &message.content,
                    message.correlation_id,
                )
                .await
            {
                // The provisional entry stays visible but unconfirmed.
                warn!(error = %err, "durable write failed");
            }
        });

        if let Err(err) = publish.await {
            warn!(error = %err, "live publish failed");
        }
        Ok(())
    }

    async fn teardown(&mut self) {
        if let Some(conversation) = self.reconciler.handle().cloned() {
            if let Err(err) = self.transport.leave_room(&conversation).await {
                debug!(conversation = %conversation, error = %err, "leave_room failed during teardown");
            }
        }
        self.reconciler.close();
        self.publish_phase();
        info!("session closed");
    }

    fn publish_phase(&self) {
        self.bus.publish_phase(self.reconciler.phase());
    }

    fn publish_timeline(&self) {
        self.bus.publish_timeline(self.reconciler.timeline().to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ripple_types::error::ConnectionError;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    /// In-memory transport: records joins/leaves/publishes, lets tests
    /// inject server events and connection flaps.
    struct FakeTransport {
        events: broadcast::Sender<TransportEvent>,
        status: Mutex<ConnectionStatus>,
        joined: Mutex<Vec<ConversationHandle>>,
        left: Mutex<Vec<ConversationHandle>>,
        published: Mutex<Vec<ClientEvent>>,
    }

    impl FakeTransport {
        fn new() -> Arc<Self> {
            let (events, _) = broadcast::channel(64);
            Arc::new(Self {
                events,
                status: Mutex::new(ConnectionStatus::Open),
                joined: Mutex::new(Vec::new()),
                left: Mutex::new(Vec::new()),
                published: Mutex::new(Vec::new()),
            })
        }

        fn deliver(&self, message: Message) {
            let _ = self
                .events
                .send(TransportEvent::Event(ServerEvent::ReceiveMessage { message }));
        }

        fn drop_connection(&self) {
            *self.status.lock().unwrap() = ConnectionStatus::Reconnecting;
            let _ = self.events.send(TransportEvent::Disconnected);
        }

        fn restore_connection(&self) {
            *self.status.lock().unwrap() = ConnectionStatus::Open;
            let _ = self.events.send(TransportEvent::Connected);
        }
    }

    impl Transport for FakeTransport {
        async fn connect(&self) -> Result<(), ConnectionError> {
            Ok(())
        }

        async fn disconnect(&self) {}

        async fn join_room(&self, room: &ConversationHandle) -> Result<(), ConnectionError> {
            self.joined.lock().unwrap().push(room.clone());
            Ok(())
        }

        async fn leave_room(&self, room: &ConversationHandle) -> Result<(), ConnectionError> {
            self.left.lock().unwrap().push(room.clone());
            Ok(())
        }

        async fn publish(&self, event: ClientEvent) -> Result<(), ConnectionError> {
            self.published.lock().unwrap().push(event);
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
            self.events.subscribe()
        }

        fn status(&self) -> ConnectionStatus {
            *self.status.lock().unwrap()
        }
    }

    /// In-memory repository with per-conversation canned histories and an
    /// optional artificial delay to exercise the stale-response guard.
    struct FakeRepository {
        histories: Mutex<HashMap<String, Vec<Message>>>,
        delay: Mutex<HashMap<String, Duration>>,
        failures: Mutex<HashMap<String, u16>>,
        created: Mutex<Vec<Message>>,
    }

    impl FakeRepository {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                histories: Mutex::new(HashMap::new()),
                delay: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                created: Mutex::new(Vec::new()),
            })
        }

        fn set_history(&self, conversation: &str, messages: Vec<Message>) {
            self.histories
                .lock()
                .unwrap()
                .insert(conversation.to_string(), messages);
        }

        fn set_delay(&self, conversation: &str, delay: Duration) {
            self.delay
                .lock()
                .unwrap()
                .insert(conversation.to_string(), delay);
        }

        fn set_failure(&self, conversation: &str, status: u16) {
            self.failures
                .lock()
                .unwrap()
                .insert(conversation.to_string(), status);
        }
    }

    impl MessageRepository for FakeRepository {
        async fn history(
            &self,
            conversation: &ConversationHandle,
        ) -> Result<Vec<Message>, FetchError> {
            let delay = self
                .delay
                .lock()
                .unwrap()
                .get(conversation.as_str())
                .copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let failure = self
                .failures
                .lock()
                .unwrap()
                .get(conversation.as_str())
                .copied();
            if let Some(status) = failure {
                return Err(FetchError::Status(status));
            }
            Ok(self
                .histories
                .lock()
                .unwrap()
                .get(conversation.as_str())
                .cloned()
                .unwrap_or_default())
        }

        async fn create(
            &self,
            conversation: &ConversationHandle,
            sender: &ParticipantId,
            content: &str,
            correlation_id: Option<Uuid>,
        ) -> Result<Message, SendError> {
            let message = Message {
                id: Some(format!("srv-{}", self.created.lock().unwrap().len() + 1)),
                sender_id: sender.clone(),
                content: content.to_string(),
                created_at: Some(Utc::now()),
                conversation_id: conversation.clone(),
                correlation_id,
            };
            self.created.lock().unwrap().push(message.clone());
            Ok(message)
        }
    }

    fn confirmed(id: &str, sender: &str, content: &str, conversation: &str) -> Message {
        Message {
            id: Some(id.to_string()),
            sender_id: ParticipantId::new(sender),
            content: content.to_string(),
            created_at: Some(Utc::now()),
            conversation_id: ConversationHandle::new(conversation),
            correlation_id: None,
        }
    }

    /// Pump the subscription until the predicate matches or a timeout hits.
    async fn wait_for<F>(rx: &mut broadcast::Receiver<SessionEvent>, mut predicate: F) -> SessionEvent
    where
        F: FnMut(&SessionEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Ok(event) if predicate(&event) => return event,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for session event")
    }

    fn timeline_of(event: &SessionEvent) -> Option<&Vec<ripple_types::session::TimelineEntry>> {
        match event {
            SessionEvent::TimelineUpdated { timeline } => Some(timeline),
            _ => None,
        }
    }

    #[tokio::test]
    async fn open_with_empty_history_goes_live() {
        let transport = FakeTransport::new();
        let repository = FakeRepository::new();
        let (handle, task) = SessionSync::spawn(
            ParticipantId::new("u1"),
            Arc::clone(&transport),
            Arc::clone(&repository),
        );
        let mut rx = handle.subscribe();

        handle.open(ConversationHandle::new("c1")).await;
        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Live })
        })
        .await;

        assert_eq!(transport.joined.lock().unwrap().len(), 1);
        handle.close().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn history_then_live_events_in_order() {
        let transport = FakeTransport::new();
        let repository = FakeRepository::new();
        repository.set_history(
            "c1",
            vec![
                confirmed("m1", "u2", "old one", "c1"),
                confirmed("m2", "u2", "old two", "c1"),
            ],
        );
        let (handle, task) = SessionSync::spawn(
            ParticipantId::new("u1"),
            Arc::clone(&transport),
            Arc::clone(&repository),
        );
        let mut rx = handle.subscribe();

        handle.open(ConversationHandle::new("c1")).await;
        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Live })
        })
        .await;

        transport.deliver(confirmed("m3", "u2", "fresh", "c1"));
        let event = wait_for(&mut rx, |e| {
            timeline_of(e).is_some_and(|t| t.len() == 3)
        })
        .await;
        let timeline = timeline_of(&event).unwrap();
        let contents: Vec<_> = timeline.iter().map(|e| e.message.content.as_str()).collect();
        assert_eq!(contents, vec!["old one", "old two", "fresh"]);

        handle.close().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn submit_publishes_persists_and_reconciles_echo() {
        let transport = FakeTransport::new();
        let repository = FakeRepository::new();
        let (handle, task) = SessionSync::spawn(
            ParticipantId::new("u1"),
            Arc::clone(&transport),
            Arc::clone(&repository),
        );
        let mut rx = handle.subscribe();

        handle.open(ConversationHandle::new("c1")).await;
        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Live })
        })
        .await;

        handle.submit("hello").await.unwrap();
        let event = wait_for(&mut rx, |e| timeline_of(e).is_some_and(|t| t.len() == 1)).await;
        assert!(timeline_of(&event).unwrap()[0].is_pending());

        // The live broadcast went out with a correlation id.
        let published = transport.published.lock().unwrap().clone();
        assert_eq!(published.len(), 1);
        let correlation_id = match &published[0] {
            ClientEvent::SendMessage { correlation_id, content, .. } => {
                assert_eq!(content, "hello");
                *correlation_id
            }
            other => panic!("unexpected publish: {other:?}"),
        };
        assert!(correlation_id.is_some());

        // Server echo confirms in place: still one entry.
        let mut echo = confirmed("srv-1", "u1", "hello", "c1");
        echo.correlation_id = correlation_id;
        transport.deliver(echo);
        let event = wait_for(&mut rx, |e| {
            timeline_of(e).is_some_and(|t| t.len() == 1 && !t[0].is_pending())
        })
        .await;
        assert_eq!(
            timeline_of(&event).unwrap()[0].message.id.as_deref(),
            Some("srv-1")
        );

        // The durable write ran too.
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if !repository.created.lock().unwrap().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        handle.close().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn slow_history_for_previous_conversation_never_leaks() {
        let transport = FakeTransport::new();
        let repository = FakeRepository::new();
        repository.set_history("a", vec![confirmed("m1", "u2", "from A", "a")]);
        repository.set_delay("a", Duration::from_millis(150));
        repository.set_history("b", vec![confirmed("m2", "u2", "from B", "b")]);

        let (handle, task) = SessionSync::spawn(
            ParticipantId::new("u1"),
            Arc::clone(&transport),
            Arc::clone(&repository),
        );
        let mut rx = handle.subscribe();

        handle.open(ConversationHandle::new("a")).await;
        // Switch before A's fetch resolves.
        handle.open(ConversationHandle::new("b")).await;

        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Live })
        })
        .await;

        // Give A's delayed fetch time to arrive (and be discarded).
        tokio::time::sleep(Duration::from_millis(250)).await;
        transport.deliver(confirmed("m3", "u2", "fresh in B", "b"));
        let event = wait_for(&mut rx, |e| timeline_of(e).is_some_and(|t| t.len() == 2)).await;
        let timeline = timeline_of(&event).unwrap();
        assert!(timeline.iter().all(|e| e.message.content != "from A"));

        // Switching also left the previous room.
        assert_eq!(transport.left.lock().unwrap().as_slice(), &[ConversationHandle::new("a")]);

        handle.close().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_and_reconnect_resumes_without_backfill() {
        let transport = FakeTransport::new();
        let repository = FakeRepository::new();
        let (handle, task) = SessionSync::spawn(
            ParticipantId::new("u1"),
            Arc::clone(&transport),
            Arc::clone(&repository),
        );
        let mut rx = handle.subscribe();

        handle.open(ConversationHandle::new("c1")).await;
        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Live })
        })
        .await;

        transport.drop_connection();
        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Reconnecting })
        })
        .await;

        transport.restore_connection();
        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Live })
        })
        .await;

        // Timeline resumes from the next live event; nothing was replayed.
        transport.deliver(confirmed("m1", "u2", "after the gap", "c1"));
        let event = wait_for(&mut rx, |e| timeline_of(e).is_some_and(|t| t.len() == 1)).await;
        assert_eq!(
            timeline_of(&event).unwrap()[0].message.content,
            "after the gap"
        );

        handle.close().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn failed_history_fetch_leaves_session_loading() {
        let transport = FakeTransport::new();
        let repository = FakeRepository::new();
        repository.set_failure("c1", 503);
        repository.set_history("c2", vec![confirmed("m1", "u2", "hi", "c2")]);

        let (handle, task) = SessionSync::spawn(
            ParticipantId::new("u1"),
            Arc::clone(&transport),
            Arc::clone(&repository),
        );
        let mut rx = handle.subscribe();

        handle.open(ConversationHandle::new("c1")).await;
        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Loading })
        })
        .await;

        // The fetch error is logged and dropped; the session neither goes
        // Live nor crashes, it just stays Loading with an empty timeline.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let (phase, timeline) = handle.snapshot();
        assert_eq!(phase, SessionPhase::Loading);
        assert!(timeline.is_empty());

        // A subsequent open is unaffected by the earlier failure.
        handle.open(ConversationHandle::new("c2")).await;
        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Live })
        })
        .await;
        assert_eq!(handle.snapshot().1.len(), 1);

        handle.close().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn submit_before_open_is_rejected() {
        let transport = FakeTransport::new();
        let repository = FakeRepository::new();
        let (handle, task) = SessionSync::spawn(
            ParticipantId::new("u1"),
            Arc::clone(&transport),
            Arc::clone(&repository),
        );

        let result = handle.submit("hello").await;
        assert!(matches!(result, Err(SendError::NotLive)));

        handle.close().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn close_emits_closed_phase() {
        let transport = FakeTransport::new();
        let repository = FakeRepository::new();
        let (handle, task) = SessionSync::spawn(
            ParticipantId::new("u1"),
            Arc::clone(&transport),
            Arc::clone(&repository),
        );
        let mut rx = handle.subscribe();

        handle.open(ConversationHandle::new("c1")).await;
        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Live })
        })
        .await;

        handle.close().await;
        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::PhaseChanged { phase: SessionPhase::Closed })
        })
        .await;
        task.await.unwrap();

        // Room left during teardown.
        assert!(transport
            .left
            .lock()
            .unwrap()
            .contains(&ConversationHandle::new("c1")));
    }
}
