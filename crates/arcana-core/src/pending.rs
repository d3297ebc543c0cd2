//! Pending correlated requests
//!
//! Explicit map from message id to the oneshot sender that settles the
//! request. Settling removes the entry under the lock, so success,
//! error, and timeout paths share one routine and exactly one of them
//! ever fires per request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::error::RequestError;
use crate::protocol::WorkspaceSelection;

type SettleResult = Result<WorkspaceSelection, RequestError>;

/// In-flight correlated requests keyed by message id
#[derive(Clone, Default)]
pub(crate) struct PendingRequests {
    inner: Arc<Mutex<HashMap<Uuid, oneshot::Sender<SettleResult>>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request and return the receiver its result
    /// arrives on
    pub fn register(&self, message_id: Uuid) -> oneshot::Receiver<SettleResult> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(message_id, tx);
        rx
    }

    /// Settle the request with the given id
    ///
    /// Returns `true` if a request was pending under that id. A second
    /// settle for the same id, or a settle for an unknown id (a late or
    /// foreign response), is a no-op returning `false`.
    pub fn settle(&self, message_id: Uuid, result: SettleResult) -> bool {
        let Some(tx) = self.lock().remove(&message_id) else {
            debug!("Ignoring response for unknown message id {}", message_id);
            return false;
        };
        // The receiver may already be gone if the caller stopped
        // waiting; the request still counts as settled.
        let _ = tx.send(result);
        true
    }

    /// Whether a request is still pending under this id
    pub fn contains(&self, message_id: Uuid) -> bool {
        self.lock().contains_key(&message_id)
    }

    /// Reject every in-flight request, used when the connection drops
    pub fn reject_all(&self, error: RequestError) {
        let drained: Vec<_> = self.lock().drain().collect();
        for (_, tx) in drained {
            let _ = tx.send(Err(error.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, oneshot::Sender<SettleResult>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
