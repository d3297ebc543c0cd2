//! Listener registry
//!
//! Maps message-type tags to sets of callbacks. Components subscribe to
//! a type and get back a [`Subscription`] that removes exactly that
//! callback; when a type's last listener is removed the entry is pruned
//! from the map.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::warn;

/// Callback invoked with the parsed frame for a subscribed message type
pub type ListenerCallback = Arc<dyn Fn(&Value) + Send + Sync + 'static>;

struct RegistryInner {
    next_id: u64,
    listeners: HashMap<String, Vec<(u64, ListenerCallback)>>,
}

/// Registry routing inbound frames to subscribed callbacks
#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                next_id: 0,
                listeners: HashMap::new(),
            })),
        }
    }

    /// Register a callback for a message type
    ///
    /// Multiple listeners per type are allowed and are invoked in
    /// registration order.
    pub fn add(
        &self,
        message_type: &str,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .listeners
            .entry(message_type.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        Subscription {
            inner: Arc::clone(&self.inner),
            message_type: message_type.to_string(),
            id,
        }
    }

    /// Invoke every listener registered for a type
    ///
    /// Callbacks run outside the registry lock, each isolated so one
    /// panicking listener cannot stop the others. A type with no
    /// listeners is a silent no-op.
    pub fn dispatch(&self, message_type: &str, payload: &Value) {
        let callbacks: Vec<ListenerCallback> = {
            let inner = lock(&self.inner);
            match inner.listeners.get(message_type) {
                Some(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                warn!("Listener for '{}' panicked", message_type);
            }
        }
    }

    /// Number of listeners currently registered for a type
    pub fn listener_count(&self, message_type: &str) -> usize {
        lock(&self.inner)
            .listeners
            .get(message_type)
            .map_or(0, Vec::len)
    }

    /// Whether any listener is registered for a type
    pub fn has_listeners(&self, message_type: &str) -> bool {
        lock(&self.inner).listeners.contains_key(message_type)
    }
}

/// Handle that removes one registered listener
///
/// Dropping the subscription without calling [`Subscription::unsubscribe`]
/// leaves the listener registered for the life of the registry.
pub struct Subscription {
    inner: Arc<Mutex<RegistryInner>>,
    message_type: String,
    id: u64,
}

impl Subscription {
    /// Remove exactly this listener, pruning the type entry if it was
    /// the last one
    pub fn unsubscribe(self) {
        let mut inner = lock(&self.inner);
        if let Some(entries) = inner.listeners.get_mut(&self.message_type) {
            entries.retain(|(id, _)| *id != self.id);
            if entries.is_empty() {
                inner.listeners.remove(&self.message_type);
            }
        }
    }
}

// Callbacks never run under the lock, so a poisoned mutex can only mean
// a panic inside the registry's own map operations; recover rather than
// propagate the panic to unrelated subscribers.
fn lock(inner: &Mutex<RegistryInner>) -> std::sync::MutexGuard<'_, RegistryInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
