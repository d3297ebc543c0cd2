//! Persistent backend connection
//!
//! Maintains the single long-lived WebSocket connection to the Arcana
//! backend. The connection task owns the socket; the
//! [`ArcanaClient`](crate::client::ArcanaClient) handle talks to it
//! through a command channel and observes it through `watch` channels.
//! Dropped connections are
//! retried automatically with a fixed delay up to a bounded number of
//! attempts; a manual reconnect bypasses the backoff and resets the
//! counter.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::client::ClientConfig;
use crate::error::{RequestError, DEFAULT_SYNC_ERROR};
use crate::listener::ListenerRegistry;
use crate::pending::PendingRequests;
use crate::protocol::{epoch_millis, ClientMessage, ResponseStatus, ServerMessage, WorkspaceSelection};
use crate::session::SyncSession;

/// Connection lifecycle state, published through a `watch` channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Attempting to open the socket
    Connecting,
    /// Socket open, frames flowing
    Connected,
    /// No live socket
    Disconnected,
}

/// Commands sent from the client handle to the connection task
#[derive(Debug)]
pub(crate) enum Command {
    /// Transmit a text frame on the current connection
    Send(String),
    /// Connect if disconnected; no-op while a connection is live.
    /// Does not touch the reconnect-attempt counter.
    Connect,
    /// Drop the current connection, reset the attempt counter, and
    /// connect again immediately
    Reconnect,
    /// Close the connection and stop the task
    Shutdown,
}

/// State shared between the connection task and the client handle
pub(crate) struct Shared {
    pub registry: ListenerRegistry,
    pub pending: PendingRequests,
    pub session: SyncSession,
    last_message: Mutex<Option<Value>>,
}

impl Shared {
    pub fn new(session: SyncSession) -> Self {
        Self {
            registry: ListenerRegistry::new(),
            pending: PendingRequests::new(),
            session,
            last_message: Mutex::new(None),
        }
    }

    pub fn last_message(&self) -> Option<Value> {
        self.last_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Handle one inbound text frame: parse, route to registered
    /// listeners, then run built-in handling for known protocol
    /// messages.
    ///
    /// Unparseable frames and frames without a `type` tag are logged
    /// and dropped without affecting the connection.
    pub fn handle_frame(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("Dropping unparseable frame: {}", e);
                return;
            }
        };
        let Some(message_type) = value.get("type").and_then(Value::as_str).map(str::to_string)
        else {
            debug!("Dropping frame without a type tag");
            return;
        };

        *self
            .last_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(value.clone());

        self.registry.dispatch(&message_type, &value);

        // Built-in handling for protocol messages the client manages
        // itself runs after listener dispatch, so subscribers observe a
        // frame before the request it settles resolves.
        if let Ok(msg) = ServerMessage::decode(&value) {
            self.handle_server_message(msg);
        }
    }

    fn handle_server_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Pong {
                client_timestamp, ..
            } => {
                debug!(
                    "Pong received, round trip {}ms",
                    epoch_millis() - client_timestamp
                );
            }
            ServerMessage::WorkspaceSelectGithubResponse {
                message_id,
                status,
                progress,
                message,
                workspace_id,
            } => match status {
                ResponseStatus::Cloning => {
                    // Progress only counts while the request is still
                    // pending; late updates must not disturb the session.
                    if self.pending.contains(message_id) {
                        self.session.apply_progress(progress, message.as_deref());
                    }
                }
                ResponseStatus::Success => {
                    let result = match workspace_id {
                        Some(workspace_id) => Ok(WorkspaceSelection { workspace_id }),
                        None => Err(RequestError::Server(
                            "Sync response is missing a workspace id".to_string(),
                        )),
                    };
                    let failed = result.is_err();
                    if self.pending.settle(message_id, result) {
                        if failed {
                            self.session.fail("Sync response is missing a workspace id");
                        } else {
                            self.session.complete(message.as_deref());
                        }
                    }
                }
                ResponseStatus::Error => {
                    let reason = message.unwrap_or_else(|| DEFAULT_SYNC_ERROR.to_string());
                    if self
                        .pending
                        .settle(message_id, Err(RequestError::Server(reason.clone())))
                    {
                        self.session.fail(&reason);
                    }
                }
            },
        }
    }
}

/// Why the connected loop returned
enum Exit {
    /// Socket closed or errored; subject to the auto-reconnect policy
    Closed,
    /// Manual reconnect requested; reconnect immediately without backoff
    Reconnect,
    /// Task should stop
    Shutdown,
}

/// Main connection loop with bounded reconnection
pub(crate) async fn run(
    config: ClientConfig,
    client_id: String,
    shared: Arc<Shared>,
    state_tx: watch::Sender<ConnectionState>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut attempts: u32 = 0;

    'outer: loop {
        let _ = state_tx.send(ConnectionState::Connecting);
        debug!("Connecting to {}", config.url);

        match connect_async(&config.url).await {
            Ok((ws_stream, _response)) => {
                attempts = 0;
                let _ = state_tx.send(ConnectionState::Connected);
                info!("Connected to {}", config.url);

                let exit = run_connected(ws_stream, &shared, &mut command_rx, &client_id).await;

                let _ = state_tx.send(ConnectionState::Disconnected);
                // A sync in progress is meaningless without a live
                // channel; in-flight requests can never settle either.
                shared.session.reset();
                shared.pending.reject_all(RequestError::ConnectionClosed);

                match exit {
                    Exit::Shutdown => break,
                    Exit::Reconnect => continue,
                    Exit::Closed => {}
                }
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", config.url, e);
                let _ = state_tx.send(ConnectionState::Disconnected);
            }
        }

        if attempts >= config.max_reconnect_attempts {
            debug!(
                "Reconnect ceiling ({}) reached, waiting for an explicit reconnect",
                config.max_reconnect_attempts
            );
            loop {
                match command_rx.recv().await {
                    Some(Command::Reconnect) => {
                        attempts = 0;
                        continue 'outer;
                    }
                    Some(Command::Connect) => continue 'outer,
                    Some(Command::Send(_)) => {
                        warn!("Dropping outbound frame: not connected");
                    }
                    Some(Command::Shutdown) | None => break 'outer,
                }
            }
        }

        attempts += 1;
        debug!(
            "Scheduling reconnect attempt {}/{} in {:?}",
            attempts, config.max_reconnect_attempts, config.reconnect_delay
        );

        let delay = tokio::time::sleep(config.reconnect_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => break,
                cmd = command_rx.recv() => match cmd {
                    Some(Command::Reconnect) => {
                        attempts = 0;
                        break;
                    }
                    Some(Command::Connect) => break,
                    Some(Command::Send(_)) => {
                        warn!("Dropping outbound frame: not connected");
                    }
                    Some(Command::Shutdown) | None => break 'outer,
                }
            }
        }
    }

    let _ = state_tx.send(ConnectionState::Disconnected);
    debug!("Connection task stopped");
}

/// Drive one live connection until it closes or the task is told to stop
async fn run_connected(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    shared: &Shared,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
    client_id: &str,
) -> Exit {
    let (mut write, mut read) = ws_stream.split();

    // Immediate liveness probe so the first heartbeat doesn't wait
    let probe = ClientMessage::ping(client_id).encode();
    if let Err(e) = write.send(Message::Text(probe)).await {
        warn!("Failed to send liveness probe: {}", e);
        return Exit::Closed;
    }

    loop {
        tokio::select! {
            cmd = command_rx.recv() => match cmd {
                Some(Command::Send(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        warn!("WebSocket send failed: {}", e);
                        return Exit::Closed;
                    }
                }
                Some(Command::Connect) => {
                    // Already connected
                }
                Some(Command::Reconnect) => {
                    write.close().await.ok();
                    return Exit::Reconnect;
                }
                Some(Command::Shutdown) | None => {
                    write.close().await.ok();
                    return Exit::Shutdown;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => shared.handle_frame(&text),
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Server closed the connection");
                    return Exit::Closed;
                }
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    return Exit::Closed;
                }
                // Binary frames are not part of the protocol;
                // ping/pong control frames are answered by tungstenite.
                Some(Ok(_)) => {}
            }
        }
    }
}
