//! Event fan-out with explicit subscription handles.
//!
//! The broker implements the engine's [`EventPublisher`] contract:
//! `publish` hands the event to every live subscriber over an unbounded
//! channel and returns immediately, so dispatch never blocks or extends a
//! measured evaluation. Subscribers hold a [`Subscription`] and drain it
//! at their own pace; dropping or unsubscribing the handle detaches it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;
use verdict_core::{EventPublisher, RuleEvent};

struct Inner {
    subscribers: RwLock<BTreeMap<u64, mpsc::UnboundedSender<RuleEvent>>>,
    next_id: AtomicU64,
}

/// Fan-out publisher for rule events.
#[derive(Clone)]
pub struct EventBroker {
    inner: Arc<Inner>,
}

impl EventBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(BTreeMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Attach a subscriber. Events published after this call are
    /// delivered to the returned handle.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.subscribers.write().insert(id, sender);
        Subscription {
            id,
            receiver,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventBroker {
    fn publish(&self, event: RuleEvent) {
        let mut dropped = Vec::new();
        {
            let subscribers = self.inner.subscribers.read();
            for (id, sender) in subscribers.iter() {
                if sender.send(event.clone()).is_err() {
                    dropped.push(*id);
                }
            }
        }
        // Prune receivers that went away without unsubscribing.
        if !dropped.is_empty() {
            let mut subscribers = self.inner.subscribers.write();
            for id in dropped {
                subscribers.remove(&id);
            }
        }
        debug!(event = %event.event_type, source = %event.source, "event published");
    }
}

/// Handle to a broker subscription.
///
/// Dropping the handle detaches the subscriber; [`unsubscribe`] makes
/// that explicit.
///
/// [`unsubscribe`]: Subscription::unsubscribe
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<RuleEvent>,
    inner: Arc<Inner>,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once detached with no
    /// events left.
    pub async fn recv(&mut self) -> Option<RuleEvent> {
        self.receiver.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<RuleEvent> {
        self.receiver.try_recv().ok()
    }

    /// Detach from the broker.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.subscribers.write().remove(&self.id);
    }
}
