//! Arcana client handle
//!
//! [`ArcanaClient`] is the public face of the connection manager. It
//! spawns the connection task once, then exposes sending, listener
//! registration, correlated workspace selection, and the observable
//! connection/sync state. Handles are cheap to clone; all clones share
//! the one connection.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::warn;
use uuid::Uuid;

use crate::connection::{self, Command, ConnectionState, Shared};
use crate::error::RequestError;
use crate::listener::Subscription;
use crate::protocol::{ClientMessage, RepoData, WorkspaceSelection};
use crate::session::{SyncSession, SyncSnapshot};

/// Tunables for the connection manager
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend WebSocket URL
    pub url: String,
    /// How long a correlated request waits for a terminal response
    pub request_timeout: Duration,
    /// Fixed delay between automatic reconnect attempts
    pub reconnect_delay: Duration,
    /// Delay before the single best-effort retry of a failed send
    pub send_retry_delay: Duration,
    /// Automatic reconnect attempts before giving up until a manual
    /// reconnect
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            request_timeout: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(5),
            send_retry_delay: Duration::from_secs(1),
            max_reconnect_attempts: 5,
        }
    }
}

impl ClientConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }
}

/// Handle to the shared backend connection
#[derive(Clone)]
pub struct ArcanaClient {
    config: ClientConfig,
    client_id: String,
    shared: Arc<Shared>,
    state_rx: watch::Receiver<ConnectionState>,
    sync_rx: watch::Receiver<SyncSnapshot>,
    command_tx: mpsc::UnboundedSender<Command>,
}

impl ArcanaClient {
    /// Spawn the connection task and start connecting immediately
    pub fn connect(config: ClientConfig) -> Self {
        let client_id = format!("arcana-{}", &Uuid::new_v4().to_string()[..8]);
        let (session, sync_rx) = SyncSession::new();
        let shared = Arc::new(Shared::new(session));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(connection::run(
            config.clone(),
            client_id.clone(),
            Arc::clone(&shared),
            state_tx,
            command_rx,
        ));

        Self {
            config,
            client_id,
            shared,
            state_rx,
            sync_rx,
            command_tx,
        }
    }

    /// Identifier this client attaches to its liveness probes
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Snapshot of the current sync session
    pub fn sync_state(&self) -> SyncSnapshot {
        self.sync_rx.borrow().clone()
    }

    /// Subscribe to sync session changes
    pub fn subscribe_sync(&self) -> watch::Receiver<SyncSnapshot> {
        self.sync_rx.clone()
    }

    /// Force the sync session back to idle
    pub fn reset_sync_status(&self) {
        self.shared.session.reset();
    }

    /// The most recently received parsed frame, if any
    pub fn last_message(&self) -> Option<Value> {
        self.shared.last_message()
    }

    /// Register a callback for inbound frames of one message type
    pub fn add_message_listener(
        &self,
        message_type: &str,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.registry.add(message_type, callback)
    }

    /// Send a raw text frame
    ///
    /// Returns `true` when the frame was handed to a live connection.
    /// When disconnected this returns `false`, nudges the task to
    /// connect, and schedules one best-effort delayed retry of the same
    /// payload with no delivery guarantee.
    pub fn send_message(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.try_send(text.clone()) {
            return true;
        }

        warn!("send_message while disconnected, scheduling one retry");
        let tx = self.command_tx.clone();
        let delay = self.config.send_retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::Send(text));
        });
        false
    }

    /// Drop the current connection (if any), reset the reconnect
    /// counter, and connect again without backoff
    pub fn reconnect(&self) {
        let _ = self.command_tx.send(Command::Reconnect);
    }

    /// Stop the connection task and close the socket
    ///
    /// The task also stops on its own once every handle is dropped.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }

    /// Select a GitHub repository for this session's workspace
    ///
    /// Sends a correlated `workspace_select_github` request and waits
    /// for the terminal response carrying the same message id. Progress
    /// updates land in the observable sync session along the way. The
    /// request fails fast when the transport is not connected, and is
    /// rejected if the connection drops before a terminal response.
    pub async fn select_github_repo(
        &self,
        repo_data: RepoData,
        access_token: &str,
    ) -> Result<WorkspaceSelection, RequestError> {
        let message_id = Uuid::new_v4();
        self.shared.session.begin();

        let mut result_rx = self.shared.pending.register(message_id);

        let frame = ClientMessage::select_github(message_id, repo_data, access_token).encode();
        if !self.try_send(frame) {
            if self
                .shared
                .pending
                .settle(message_id, Err(RequestError::NotConnected))
            {
                self.shared
                    .session
                    .fail(&RequestError::NotConnected.to_string());
            }
        }

        match tokio::time::timeout(self.config.request_timeout, &mut result_rx).await {
            Ok(Ok(result)) => result,
            // The sender is dropped without settling only when the
            // whole client is going away.
            Ok(Err(_)) => Err(RequestError::Shutdown),
            Err(_elapsed) => {
                if self
                    .shared
                    .pending
                    .settle(message_id, Err(RequestError::Timeout))
                {
                    self.shared
                        .session
                        .fail(&RequestError::Timeout.to_string());
                    Err(RequestError::Timeout)
                } else {
                    // A terminal response won the race against the
                    // timeout; report the settled outcome, not a
                    // spurious timeout that would contradict the
                    // session state.
                    result_rx.await.unwrap_or(Err(RequestError::Shutdown))
                }
            }
        }
    }

    /// Hand a frame to the connection task if it is currently connected
    fn try_send(&self, text: String) -> bool {
        if self.connection_state() == ConnectionState::Connected {
            self.command_tx.send(Command::Send(text)).is_ok()
        } else {
            let _ = self.command_tx.send(Command::Connect);
            false
        }
    }
}
