//! Push-message observer registry.
//!
//! Owned by a [`KevoClient`](crate::KevoClient) instance and shared with its
//! push task. Subscribers are keyed by an [`ObserverId`] handed back from
//! [`ObserverRegistry::subscribe`]; that id is the subscriber's identity.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};

use tracing::{trace, warn};
use uuid::Uuid;

use crate::models::PushMessage;

/// Callback invoked for every decoded push message.
pub type Observer = Arc<dyn Fn(&PushMessage) + Send + Sync>;

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Set of push-message subscribers.
///
/// Dispatch order across subscribers is unspecified.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<HashMap<ObserverId, Observer>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; keep the returned id to unsubscribe later.
    pub fn subscribe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&PushMessage) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(callback))
    }

    /// Register an already shared callback.
    pub fn subscribe_arc(&self, callback: Observer) -> ObserverId {
        let id = ObserverId(Uuid::new_v4());
        self.write().insert(id, callback);
        trace!(%id, "observer subscribed");
        id
    }

    /// Remove a subscriber. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.write().remove(&id).is_some();
        trace!(%id, removed, "observer unsubscribed");
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Invoke every current subscriber with `message`.
    ///
    /// Works on a snapshot, so callbacks may (un)subscribe freely. A
    /// panicking callback is logged and skipped; the rest still run.
    /// Returns how many callbacks completed without panicking.
    pub fn dispatch(&self, message: &PushMessage) -> usize {
        let snapshot: Vec<(ObserverId, Observer)> = self
            .read()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(message))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(ToString::to_string)
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".into());
                    warn!(%id, %reason, "observer panicked during dispatch");
                }
            }
        }
        delivered
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ObserverId, Observer>> {
        self.observers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ObserverId, Observer>> {
        self.observers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
