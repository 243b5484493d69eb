//! Give-event publish/subscribe channel
//!
//! Lets a dosing action start or restart a relaxant timer without knowing
//! anything about timer state. Delivery is synchronous and at most once per
//! publish; nothing is queued, so a publish with no subscriber is dropped.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, Weak,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::AgentKey;

/// A dose was given for `agent` at `at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiveEvent {
    pub agent_key: AgentKey,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl GiveEvent {
    pub fn new(agent_key: AgentKey, timestamp: DateTime<Utc>) -> Self {
        Self { agent_key, timestamp }
    }
}

type Handler = Arc<dyn Fn(&GiveEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    handlers: Mutex<Vec<(u64, Handler)>>,
    next_id: AtomicU64,
}

impl Subscribers {
    fn remove(&self, id: u64) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.retain(|(hid, _)| *hid != id);
        }
    }
}

#[derive(Clone, Default)]
pub struct TriggerChannel {
    subscribers: Arc<Subscribers>,
}

impl TriggerChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it stays registered until the returned guard is
    /// dropped or `unsubscribe` is called
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&GiveEvent) + Send + Sync + 'static,
    {
        let id = self.subscribers.next_id.fetch_add(1, Ordering::Relaxed);
        match self.subscribers.handlers.lock() {
            Ok(mut handlers) => handlers.push((id, Arc::new(handler))),
            Err(e) => warn!("Failed to register give handler: {}", e),
        }
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Deliver to every current subscriber; returns how many received it
    pub fn publish(&self, event: GiveEvent) -> usize {
        // snapshot so handlers may subscribe/unsubscribe while being called
        let handlers: Vec<Handler> = match self.subscribers.handlers.lock() {
            Ok(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            Err(e) => {
                warn!("Give channel lock poisoned: {}", e);
                return 0;
            }
        };
        if handlers.is_empty() {
            debug!("Give event for {} dropped, no subscribers", event.agent_key);
        }
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.handlers.lock().map(|h| h.len()).unwrap_or(0)
    }
}

/// Registration guard returned by [`TriggerChannel::subscribe`]
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Subscribers>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.remove(self.id);
        }
    }
}
