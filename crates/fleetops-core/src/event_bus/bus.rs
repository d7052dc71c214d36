use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

use super::types::{Event, Topic};

/// Default per-subscriber queue depth
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

struct Subscriber {
    filter: Option<Topic>,
    tx: mpsc::Sender<Event>,
}

impl Subscriber {
    fn wants(&self, event: &Event) -> bool {
        self.filter.as_ref().map_or(true, |topic| *topic == event.topic)
    }
}

struct Registry {
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Channel-per-subscriber event bus.
///
/// Every subscriber owns a bounded queue. Publishing never waits: a full
/// queue drops the event for that subscriber only, and a subscriber whose
/// receiving side is gone is removed.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    /// Create a new EventBus with the given per-subscriber queue depth.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Subscribe to future events, optionally restricted to one topic.
    #[must_use]
    pub fn subscribe(&self, filter: Option<Topic>) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.registry.capacity);
        self.registry
            .subscribers
            .insert(id, Subscriber { filter, tx });
        debug!(subscriber = id, "Event subscriber registered");
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Subscribe to the events of one task.
    #[must_use]
    pub fn subscribe_task(&self, task_id: Uuid) -> Subscription {
        self.subscribe(Some(Topic::Task(task_id)))
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: u64) -> bool {
        self.registry.subscribers.remove(&id).is_some()
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn publish(&self, event: Event) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.registry.subscribers.iter() {
            if !entry.wants(&event) {
                continue;
            }
            match entry.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber = *entry.key(), "Subscriber queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // removal happens outside the iteration, which holds shard locks
        for id in closed {
            self.registry.subscribers.remove(&id);
            debug!(subscriber = id, "Removed closed event subscriber");
        }

        delivered
    }

    /// Get the current number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Event>,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Subscriber ID, usable with [`EventBus::unsubscribe`]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event; `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Next already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.subscribers.remove(&self.id);
        }
    }
}
