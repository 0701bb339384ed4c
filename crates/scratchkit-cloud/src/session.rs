//! The cloud session state machine.
//!
//! A session owns one transport for its lifetime. `connect` performs
//! the handshake and the deadline-bounded first read (the authoritative
//! initial snapshot), then hands the transport to a spawned read loop
//! that multiplexes outbound frames with inbound chunks. Each accepted
//! `set` event is applied to the [`VariableStore`] and then published
//! to subscribers, in that order, so a subscriber never observes an
//! event the store doesn't yet reflect.
//!
//! There is no reconnection: a lost transport is terminal for the
//! session and the owner decides whether to build a new one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use scratchkit_core::{CloudSettings, CredentialProvider, Settings};

use crate::codec::{CloudEvent, OutboundFrame, decode_chunk};
use crate::error::CloudError;
use crate::registry::{SubscriberRegistry, Subscription};
use crate::store::VariableStore;
use crate::transport::ws::WsConnector;
use crate::transport::{CloudConnector, CloudTransport, ConnectAuth, TransportError};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, never connected.
    Idle,
    /// Opening the transport.
    Connecting,
    /// Transport open, waiting on the initial variable sync.
    Handshaking,
    /// Steady state: the read loop is consuming events.
    Synchronized,
    /// `close()` in progress.
    Closing,
    /// Closed cleanly (by this side or a server close frame).
    Closed,
    /// Terminal failure; see [`CloudSession::fault`].
    Failed,
}

impl SessionState {
    /// Whether the session can never leave this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Synchronized => "synchronized",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An outbound frame travelling to the read loop, with its ack.
struct Command {
    frame: String,
    ack: oneshot::Sender<Result<(), TransportError>>,
}

/// Handles to the running read loop.
struct Link {
    cmd_tx: mpsc::Sender<Command>,
    reader: JoinHandle<()>,
}

/// A cloud-variable session for one room.
///
/// Not reusable across rooms; a fresh session is required to join a
/// different project.
pub struct CloudSession {
    settings: CloudSettings,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn CloudConnector>,
    state: Arc<RwLock<SessionState>>,
    room: RwLock<Option<u64>>,
    store: Arc<VariableStore>,
    registry: Arc<SubscriberRegistry>,
    fault: Arc<RwLock<Option<TransportError>>>,
    link: Mutex<Option<Link>>,
}

impl CloudSession {
    /// Create an idle session with an explicit connector (tests inject
    /// an in-memory transport here).
    pub fn new(
        settings: CloudSettings,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn CloudConnector>,
    ) -> Self {
        let registry = SubscriberRegistry::new(settings.event_buffer);
        Self {
            settings,
            credentials,
            connector,
            state: Arc::new(RwLock::new(SessionState::Idle)),
            room: RwLock::new(None),
            store: Arc::new(VariableStore::new()),
            registry: Arc::new(registry),
            fault: Arc::new(RwLock::new(None)),
            link: Mutex::new(None),
        }
    }

    /// Create an idle session against the real service, using loaded
    /// settings and the WebSocket connector.
    pub fn with_defaults(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::new(Settings::load().cloud, credentials, Arc::new(WsConnector))
    }

    /// Connect to a room: open the transport with the current identity,
    /// handshake, prime the store from the initial sync batch, and start
    /// the read loop. Valid only from `idle`; a failed connect leaves
    /// the session `failed` and is not retried.
    pub async fn connect(&self, room: u64) -> Result<(), CloudError> {
        {
            let mut state = self.state.write();
            if *state != SessionState::Idle {
                return Err(CloudError::InvalidState {
                    operation: "connect",
                    state: *state,
                });
            }
            *state = SessionState::Connecting;
        }

        let creds = self.credentials.credentials();
        let auth = ConnectAuth {
            cookie: creds
                .as_ref()
                .map(|c| format!("scratchsessionsid={};", c.session_id)),
            origin: self.settings.origin.clone(),
        };

        let mut transport = match self.connector.connect(&self.settings.endpoint, &auth).await {
            Ok(transport) => transport,
            Err(error) => {
                self.fail(error.clone());
                return Err(CloudError::Connection {
                    reason: error.to_string(),
                });
            }
        };

        *self.room.write() = Some(room);
        *self.state.write() = SessionState::Handshaking;
        debug!(room, "handshaking");

        let user = creds.map(|c| c.username).unwrap_or_default();
        if let Err(error) = transport
            .send(OutboundFrame::handshake(room, &user).encode())
            .await
        {
            self.fail(error.clone());
            return Err(CloudError::Connection {
                reason: error.to_string(),
            });
        }

        // The first inbound chunk is the authoritative initial snapshot.
        // It primes the store and is not republished to subscribers.
        let timeout_ms = self.settings.handshake_timeout_ms;
        let first = tokio::time::timeout(Duration::from_millis(timeout_ms), transport.recv()).await;
        let chunk = match first {
            Err(_) => {
                let _ = transport.close().await;
                self.fail(TransportError::Receive {
                    reason: format!("no initial sync within {timeout_ms}ms"),
                });
                return Err(CloudError::Timeout {
                    timeout_ms,
                    context: "initial variable sync",
                });
            }
            Ok(None) => {
                let error = TransportError::Receive {
                    reason: "connection closed during handshake".to_string(),
                };
                self.fail(error.clone());
                return Err(CloudError::Connection {
                    reason: error.to_string(),
                });
            }
            Ok(Some(Err(error))) => {
                self.fail(error.clone());
                return Err(CloudError::Connection {
                    reason: error.to_string(),
                });
            }
            Ok(Some(Ok(chunk))) => chunk,
        };
        apply_chunk(&chunk, &self.store, None);

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let reader = tokio::spawn(read_loop(
            transport,
            cmd_rx,
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            Arc::clone(&self.state),
            Arc::clone(&self.fault),
        ));
        *self.link.lock() = Some(Link { cmd_tx, reader });
        *self.state.write() = SessionState::Synchronized;
        debug!(room, variables = self.store.len(), "synchronized");
        Ok(())
    }

    /// Request a variable change. Valid only while `synchronized`.
    ///
    /// The local store is not touched here. The server is the single
    /// source of truth, and the value lands via the echoed `set` event
    /// like any other. Callers must not assume read-after-write.
    pub async fn set(&self, name: &str, value: &str) -> Result<(), CloudError> {
        let state = self.state();
        if state != SessionState::Synchronized {
            return Err(CloudError::InvalidState {
                operation: "set",
                state,
            });
        }
        let Some(room) = self.room() else {
            return Err(CloudError::InvalidState {
                operation: "set",
                state,
            });
        };

        let user = self
            .credentials
            .credentials()
            .map(|c| c.username)
            .unwrap_or_default();
        let frame = OutboundFrame::set(name, room, &user, value).encode();

        let cmd_tx = self.link.lock().as_ref().map(|link| link.cmd_tx.clone());
        let Some(cmd_tx) = cmd_tx else {
            return Err(CloudError::Closed);
        };
        let (ack_tx, ack_rx) = oneshot::channel();
        cmd_tx
            .send(Command {
                frame,
                ack: ack_tx,
            })
            .await
            .map_err(|_| CloudError::Closed)?;
        match ack_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(CloudError::TransportLost {
                reason: error.to_string(),
            }),
            Err(_) => Err(CloudError::Closed),
        }
    }

    /// Last-known value of a variable. No network call is made; `None`
    /// means the variable has never been observed in this session.
    pub fn get(&self, name: &str) -> Option<String> {
        self.store.get(name)
    }

    /// A copy of every variable observed so far.
    pub fn variables(&self) -> HashMap<String, String> {
        self.store.snapshot()
    }

    /// Subscribe to every accepted `set` event from this point on, in
    /// apply order. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        self.registry.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// The room this session is (or was) connected to.
    pub fn room(&self) -> Option<u64> {
        *self.room.read()
    }

    /// The transport error that made the session `failed`, if any.
    /// `closed` with no fault means the connection ended cleanly.
    pub fn fault(&self) -> Option<TransportError> {
        self.fault.read().clone()
    }

    /// Close the session: stop the read loop and release the transport.
    /// Valid from any state and idempotent; a `failed` session stays
    /// `failed`.
    pub async fn close(&self) {
        {
            let mut state = self.state.write();
            if !state.is_terminal() {
                *state = SessionState::Closing;
            }
        }
        let link = self.link.lock().take();
        if let Some(Link { cmd_tx, reader }) = link {
            // Dropping the command channel asks a healthy loop to close
            // the transport; abort covers one stuck mid-receive. Either
            // way the transport is dropped with the task.
            drop(cmd_tx);
            reader.abort();
            let _ = reader.await;
        }
        finish(&self.state, SessionState::Closed);
    }

    fn fail(&self, error: TransportError) {
        *self.fault.write() = Some(error);
        finish(&self.state, SessionState::Failed);
    }
}

impl Drop for CloudSession {
    fn drop(&mut self) {
        // Backstop so the read loop and its transport never outlive the
        // session, even when `close()` was skipped.
        if let Some(link) = self.link.get_mut().take() {
            link.reader.abort();
        }
    }
}

/// Move to a terminal state unless one was already reached.
fn finish(state: &RwLock<SessionState>, to: SessionState) {
    let mut state = state.write();
    if !state.is_terminal() {
        *state = to;
    }
}

/// Decode a chunk and apply its `set` events: store first, then (in the
/// steady state) publish. Malformed lines are skipped, never fatal.
fn apply_chunk(chunk: &str, store: &VariableStore, registry: Option<&SubscriberRegistry>) {
    for decoded in decode_chunk(chunk) {
        match decoded {
            Ok(CloudEvent::Set(event)) => {
                store.apply(&event);
                if let Some(registry) = registry {
                    registry.publish(&event);
                }
            }
            Ok(CloudEvent::Unknown) => {}
            Err(error) => warn!(%error, "skipping malformed event line"),
        }
    }
}

/// The steady-state loop. Owns the transport exclusively; multiplexes
/// outbound commands with inbound chunks until the connection ends.
async fn read_loop(
    mut transport: Box<dyn CloudTransport>,
    mut commands: mpsc::Receiver<Command>,
    store: Arc<VariableStore>,
    registry: Arc<SubscriberRegistry>,
    state: Arc<RwLock<SessionState>>,
    fault: Arc<RwLock<Option<TransportError>>>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(Command { frame, ack }) = command else {
                    // Session closing or dropped; release the connection.
                    let _ = transport.close().await;
                    finish(&state, SessionState::Closed);
                    break;
                };
                let result = transport.send(frame).await;
                let error = result.as_ref().err().cloned();
                let _ = ack.send(result);
                if let Some(error) = error {
                    warn!(%error, "send failed");
                    *fault.write() = Some(error);
                    finish(&state, SessionState::Failed);
                    break;
                }
            }
            chunk = transport.recv() => {
                match chunk {
                    Some(Ok(text)) => apply_chunk(&text, &store, Some(&registry)),
                    Some(Err(error)) => {
                        warn!(%error, "transport lost");
                        *fault.write() = Some(error);
                        finish(&state, SessionState::Failed);
                        break;
                    }
                    None => {
                        debug!("server closed the connection");
                        finish(&state, SessionState::Closed);
                        break;
                    }
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
