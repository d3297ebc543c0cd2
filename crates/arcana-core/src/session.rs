//! Sync session state machine
//!
//! Tracks one repository synchronization attempt as a coarse
//! status/progress/error/message tuple. The session is derived state:
//! it is mutated only by workspace selection responses, reset to idle
//! when the connection drops, and reset to initializing when a new
//! selection request is issued.
//!
//! Snapshots are published through a `watch` channel so consumers react
//! to changes instead of polling.

use serde::Serialize;
use tokio::sync::watch;

/// Progress threshold below which a cloning update still counts as initializing
const INITIALIZING_CEILING: i64 = 10;

/// Coarse sync status for one synchronization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No sync in progress
    Idle,
    /// Request sent, clone barely started
    Initializing,
    /// Clone/index in progress
    Syncing,
    /// Workspace ready
    Synchronized,
    /// Sync failed
    Error,
}

/// Observable state of the current sync session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    /// Progress percentage, clamped to 0-100
    pub progress: u8,
    /// Failure reason when status is `Error`
    pub error: Option<String>,
    /// Most recent human-readable progress message from the backend
    pub message: Option<String>,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            progress: 0,
            error: None,
            message: None,
        }
    }
}

/// Writer side of the sync session
///
/// All transitions go through here so there is a single place that
/// publishes snapshots.
pub(crate) struct SyncSession {
    tx: watch::Sender<SyncSnapshot>,
}

impl SyncSession {
    pub fn new() -> (Self, watch::Receiver<SyncSnapshot>) {
        let (tx, rx) = watch::channel(SyncSnapshot::default());
        (Self { tx }, rx)
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.tx.borrow().clone()
    }

    /// Force the session back to idle (initial state, and the state
    /// forced whenever the connection drops)
    pub fn reset(&self) {
        let _ = self.tx.send(SyncSnapshot::default());
    }

    /// Start a new session: a selection request is about to be sent
    pub fn begin(&self) {
        let _ = self.tx.send(SyncSnapshot {
            status: SyncStatus::Initializing,
            progress: 0,
            error: None,
            message: None,
        });
    }

    /// Apply an in-progress (`cloning`) update
    ///
    /// A missing progress value keeps the previous one. Regressions are
    /// accepted as-is; the backend is trusted to send non-decreasing
    /// progress and the client only clamps to the 0-100 range.
    pub fn apply_progress(&self, progress: Option<i64>, message: Option<&str>) {
        self.tx.send_modify(|snap| {
            if let Some(p) = progress {
                snap.progress = p.clamp(0, 100) as u8;
            }
            snap.status = if i64::from(snap.progress) < INITIALIZING_CEILING {
                SyncStatus::Initializing
            } else {
                SyncStatus::Syncing
            };
            if let Some(m) = message {
                snap.message = Some(m.to_string());
            }
            snap.error = None;
        });
    }

    /// Terminal success: workspace is synchronized
    pub fn complete(&self, message: Option<&str>) {
        self.tx.send_modify(|snap| {
            snap.status = SyncStatus::Synchronized;
            snap.progress = 100;
            snap.error = None;
            if let Some(m) = message {
                snap.message = Some(m.to_string());
            }
        });
    }

    /// Terminal failure
    pub fn fail(&self, reason: &str) {
        self.tx.send_modify(|snap| {
            snap.status = SyncStatus::Error;
            snap.error = Some(reason.to_string());
        });
    }
}
