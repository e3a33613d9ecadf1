//! Subscription Registry — who is watching which order, and how to reach
//! them.
//!
//! Two maps form one invariant: every subscriber in an order's watch set has
//! a channel entry, and vice versa (modulo the narrow window while a cleanup
//! is in flight). Both maps live behind a single mutex so the invariant is
//! maintained atomically; critical sections are short map operations and the
//! lock is never held across an `await`.
//!
//! # Thread Safety
//!
//! - `register` is called from request handlers; `unregister` from request
//!   guards, timeouts, and the dispatcher's terminal-delivery path — any of
//!   these may race. `unregister` is remove-if-present: a second invocation
//!   is a no-op, not an error.
//! - `watchers_of` returns an owned snapshot; registry changes after the
//!   snapshot do not retroactively affect an in-flight dispatch iteration.
//! - `sender_for` returning `None` means the subscriber is already gone;
//!   callers skip it silently.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::StageEvent;

// ---------------------------------------------------------------------------
// SubscriberId
// ---------------------------------------------------------------------------

/// Unique subscriber identifier, generated at subscribe time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SubscriptionRegistry
// ---------------------------------------------------------------------------

struct Subscription {
    order_id: usize,
    sender: mpsc::Sender<StageEvent>,
}

#[derive(Default)]
struct Inner {
    /// order ID → subscribers currently watching it.
    watchers: HashMap<usize, HashSet<SubscriberId>>,
    /// subscriber → the order it watches and its outbound channel.
    channels: HashMap<SubscriberId, Subscription>,
}

/// Bidirectional order↔subscriber mapping with idempotent cleanup.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscriber watching `order_id` with its outbound channel.
    pub fn register(&self, order_id: usize, id: SubscriberId, sender: mpsc::Sender<StageEvent>) {
        let mut inner = self.lock();
        inner.watchers.entry(order_id).or_default().insert(id);
        inner.channels.insert(id, Subscription { order_id, sender });
    }

    /// Remove a subscriber from both maps, dropping its channel sender.
    ///
    /// Safe to invoke from any trigger — disconnect, timeout, or terminal
    /// delivery — and safe to invoke twice. Returns whether the subscriber
    /// was still present.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut inner = self.lock();
        let Some(subscription) = inner.channels.remove(&id) else {
            return false;
        };
        if let Some(watchers) = inner.watchers.get_mut(&subscription.order_id) {
            watchers.remove(&id);
            if watchers.is_empty() {
                inner.watchers.remove(&subscription.order_id);
            }
        }
        true
    }

    /// Stable snapshot of the subscribers watching `order_id`.
    #[must_use]
    pub fn watchers_of(&self, order_id: usize) -> Vec<SubscriberId> {
        self.lock()
            .watchers
            .get(&order_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Resolve a subscriber's channel sender, or `None` if already gone.
    #[must_use]
    pub fn sender_for(&self, id: SubscriberId) -> Option<mpsc::Sender<StageEvent>> {
        self.lock().channels.get(&id).map(|s| s.sender.clone())
    }

    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.lock().channels.contains_key(&id)
    }

    /// Total registered subscribers, across all orders.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().channels.len()
    }
}
