//! WebSocket transport channel.
//!
//! One background task owns the socket: it reconnects with capped
//! exponential backoff, replays the active room set after every successful
//! (re)connect (room membership does not survive a drop), forwards server
//! frames to broadcast subscribers in receipt order, and drains the
//! outbound queue. Malformed frames are logged and ignored, never fatal.

use std::sync::{Arc, RwLock};

use dashmap::DashSet;
use futures_util::{SinkExt, StreamExt};
use ripple_core::transport::{Transport, TransportEvent};
use ripple_types::config::ReconnectConfig;
use ripple_types::conversation::ConversationHandle;
use ripple_types::error::ConnectionError;
use ripple_types::event::{ClientEvent, ServerEvent};
use ripple_types::session::ConnectionStatus;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the broadcast channel for transport events.
const EVENT_CAPACITY: usize = 256;
/// Capacity of the outbound frame queue.
const OUTBOUND_CAPACITY: usize = 64;

/// WebSocket implementation of the [`Transport`] port.
///
/// Cheap to clone via the shared inner state; exactly one live connection
/// per instance regardless of how many clones exist.
#[derive(Clone)]
pub struct WsTransport {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    reconnect: ReconnectConfig,
    events: broadcast::Sender<TransportEvent>,
    status: RwLock<ConnectionStatus>,
    /// Rooms the caller currently considers active; replayed on reconnect.
    rooms: DashSet<ConversationHandle>,
    /// Present while a connection task is running.
    link: RwLock<Option<Link>>,
}

struct Link {
    outbound_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, reconnect: ReconnectConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                reconnect,
                events,
                status: RwLock::new(ConnectionStatus::Closed),
                rooms: DashSet::new(),
                link: RwLock::new(None),
            }),
        }
    }

    fn set_status(inner: &Inner, status: ConnectionStatus) {
        if let Ok(mut guard) = inner.status.write() {
            *guard = status;
        }
    }

    async fn send_frame(&self, event: &ClientEvent) -> Result<(), ConnectionError> {
        let text =
            serde_json::to_string(event).map_err(|e| ConnectionError::Send(e.to_string()))?;
        let tx = self
            .inner
            .link
            .read()
            .ok()
            .and_then(|link| link.as_ref().map(|l| l.outbound_tx.clone()))
            .ok_or(ConnectionError::Closed)?;
        tx.send(text).await.map_err(|_| ConnectionError::Closed)
    }

    async fn run_loop(
        inner: Arc<Inner>,
        mut outbound_rx: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) {
        let mut backoff = super::backoff::Backoff::new(inner.reconnect.clone());
        let mut was_open = false;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match connect_async(inner.url.as_str()).await {
                Ok((stream, _)) => {
                    backoff.reset();
                    let (mut sink, mut read) = stream.split();

                    // Rejoin active rooms before announcing Connected, so a
                    // subscriber seeing Connected can rely on room membership.
                    let rooms: Vec<ConversationHandle> =
                        inner.rooms.iter().map(|r| r.key().clone()).collect();
                    let mut replay_ok = true;
                    for room in rooms {
                        let frame = ClientEvent::JoinRoom {
                            conversation_id: room,
                        };
                        match serde_json::to_string(&frame) {
                            Ok(text) => {
                                if sink.send(WsMessage::Text(text.into())).await.is_err() {
                                    replay_ok = false;
                                    break;
                                }
                            }
                            Err(err) => warn!(error = %err, "failed to encode join frame"),
                        }
                    }
                    if !replay_ok {
                        Self::set_status(&inner, ConnectionStatus::Reconnecting);
                        if was_open {
                            was_open = false;
                            let _ = inner.events.send(TransportEvent::Disconnected);
                        }
                    } else {
                        Self::set_status(&inner, ConnectionStatus::Open);
                        was_open = true;
                        info!(url = %inner.url, "transport connected");
                        let _ = inner.events.send(TransportEvent::Connected);

                        loop {
                            tokio::select! {
                                _ = cancel.cancelled() => {
                                    let _ = sink.send(WsMessage::Close(None)).await;
                                    Self::set_status(&inner, ConnectionStatus::Closed);
                                    return;
                                }

                                frame = outbound_rx.recv() => match frame {
                                    Some(text) => {
                                        if sink.send(WsMessage::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    None => {
                                        Self::set_status(&inner, ConnectionStatus::Closed);
                                        return;
                                    }
                                },

                                msg = read.next() => match msg {
                                    Some(Ok(WsMessage::Text(text))) => {
                                        match serde_json::from_str::<ServerEvent>(&text) {
                                            Ok(event) => {
                                                let _ = inner.events.send(TransportEvent::Event(event));
                                            }
                                            Err(err) => {
                                                let snippet: String = text.chars().take(200).collect();
                                                warn!(error = %err, frame = %snippet, "ignoring unparseable frame");
                                            }
                                        }
                                    }
                                    Some(Ok(WsMessage::Close(_))) | None => break,
                                    Some(Err(err)) => {
                                        debug!(error = %err, "websocket receive error");
                                        break;
                                    }
                                    Some(Ok(_)) => {}
                                }
                            }
                        }

                        Self::set_status(&inner, ConnectionStatus::Reconnecting);
                        was_open = false;
                        let _ = inner.events.send(TransportEvent::Disconnected);
                        warn!(url = %inner.url, "transport dropped, reconnecting");
                    }
                }
                Err(err) => {
                    warn!(url = %inner.url, error = %err, "connect failed");
                    Self::set_status(&inner, ConnectionStatus::Reconnecting);
                    if was_open {
                        was_open = false;
                        let _ = inner.events.send(TransportEvent::Disconnected);
                    }
                }
            }

            let delay = backoff.next_delay();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Self::set_status(&inner, ConnectionStatus::Closed);
    }
}

impl Transport for WsTransport {
    async fn connect(&self) -> Result<(), ConnectionError> {
        {
            let link = self
                .inner
                .link
                .read()
                .map_err(|_| ConnectionError::Connect("transport state poisoned".to_string()))?;
            if link.as_ref().is_some_and(|l| !l.cancel.is_cancelled()) {
                return Ok(());
            }
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let cancel = CancellationToken::new();
        {
            let mut link = self
                .inner
                .link
                .write()
                .map_err(|_| ConnectionError::Connect("transport state poisoned".to_string()))?;
            *link = Some(Link {
                outbound_tx,
                cancel: cancel.clone(),
            });
        }
        Self::set_status(&self.inner, ConnectionStatus::Connecting);
        tokio::spawn(Self::run_loop(Arc::clone(&self.inner), outbound_rx, cancel));
        Ok(())
    }

    async fn disconnect(&self) {
        if let Ok(mut link) = self.inner.link.write() {
            if let Some(link) = link.take() {
                link.cancel.cancel();
            }
        }
        Self::set_status(&self.inner, ConnectionStatus::Closed);
    }

    async fn join_room(&self, room: &ConversationHandle) -> Result<(), ConnectionError> {
        if !self.inner.rooms.insert(room.clone()) {
            // Already active: the join signal was either sent on this link
            // or will be replayed on the next one.
            return Ok(());
        }
        if self.status() == ConnectionStatus::Open {
            self.send_frame(&ClientEvent::JoinRoom {
                conversation_id: room.clone(),
            })
            .await?;
        }
        Ok(())
    }

    async fn leave_room(&self, room: &ConversationHandle) -> Result<(), ConnectionError> {
        let was_active = self.inner.rooms.remove(room).is_some();
        if was_active && self.status() == ConnectionStatus::Open {
            self.send_frame(&ClientEvent::LeaveRoom {
                conversation_id: room.clone(),
            })
            .await?;
        }
        Ok(())
    }

    async fn publish(&self, event: ClientEvent) -> Result<(), ConnectionError> {
        self.send_frame(&event).await
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.events.subscribe()
    }

    fn status(&self) -> ConnectionStatus {
        self.inner
            .status
            .read()
            .map(|s| *s)
            .unwrap_or(ConnectionStatus::Closed)
    }
}
