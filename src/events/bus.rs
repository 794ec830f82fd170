//! Priority-ordered publish/subscribe bus
//!
//! Subscribers register per topic with a priority, an optional scope tag and
//! an exclusive flag. `publish` walks matching subscribers from highest to
//! lowest priority (ties in registration order). A handler returns
//! `Ok(true)` when it handled the event; an exclusive subscriber that handles
//! an event stops the walk.
//!
//! Dispatch runs on a snapshot of the subscriber list, so handlers may
//! subscribe or unsubscribe while an event is being delivered.

use super::event::{topics, Event};
use crate::core::types::SubscriptionId;
use ahash::AHashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// What a handler reports back: `Ok(handled)` or an error message
pub type HandlerResult = std::result::Result<bool, String>;

type Handler = Arc<dyn Fn(&Event) -> HandlerResult + Send + Sync>;

/// Registration options for a subscriber
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Higher runs first
    pub priority: i32,
    /// Tag for bulk removal via `unsubscribe_scope`
    pub scope: Option<String>,
    /// Stop dispatch once this subscriber reports handled
    pub exclusive: bool,
}

impl SubscribeOptions {
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }

    pub fn in_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    priority: i32,
    scope: Option<String>,
    exclusive: bool,
    handler: Handler,
}

/// In-process event bus shared by the pipeline components
pub struct EventBus {
    topics: RwLock<AHashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(AHashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for a topic (`"*"` receives every topic)
    pub fn subscribe<F>(&self, topic: &str, handler: F, options: SubscribeOptions) -> SubscriptionId
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription {
            id,
            priority: options.priority,
            scope: options.scope,
            exclusive: options.exclusive,
            handler: Arc::new(handler),
        };

        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let list = topics.entry(topic.to_string()).or_default();
        // Insert after every subscriber with priority >= ours
        let pos = list
            .iter()
            .position(|s| subscription.priority > s.priority)
            .unwrap_or(list.len());
        list.insert(pos, subscription);

        tracing::trace!(topic, subscription = id.0, "subscribed");
        id
    }

    /// Remove a single subscription; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        for list in topics.values_mut() {
            let before = list.len();
            list.retain(|s| s.id != id);
            removed |= list.len() != before;
        }
        topics.retain(|_, list| !list.is_empty());
        removed
    }

    /// Remove every subscription tagged with `scope`, returning how many went
    pub fn unsubscribe_scope(&self, scope: &str) -> usize {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for list in topics.values_mut() {
            let before = list.len();
            list.retain(|s| s.scope.as_deref() != Some(scope));
            removed += before - list.len();
        }
        topics.retain(|_, list| !list.is_empty());
        tracing::debug!(scope, removed, "scope unsubscribed");
        removed
    }

    /// Number of live subscriptions across all topics
    pub fn subscription_count(&self) -> usize {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.values().map(Vec::len).sum()
    }

    /// Publish an event on its own topic
    pub fn emit(&self, event: &Event) -> bool {
        self.publish(event.topic(), event)
    }

    /// Deliver `event` to subscribers of `topic`; true if any handled it
    pub fn publish(&self, topic: &str, event: &Event) -> bool {
        let snapshot = self.snapshot(topic);
        let mut handled = false;

        for subscription in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| (subscription.handler)(event)));
            match outcome {
                Ok(Ok(true)) => {
                    handled = true;
                    if subscription.exclusive {
                        tracing::trace!(topic, subscription = subscription.id.0, "exclusive stop");
                        break;
                    }
                }
                Ok(Ok(false)) => {}
                Ok(Err(message)) => {
                    tracing::warn!(topic, subscription = subscription.id.0, %message, "handler failed");
                }
                Err(_) => {
                    tracing::error!(topic, subscription = subscription.id.0, "handler panicked");
                }
            }
        }

        handled
    }

    /// Subscribers for `topic` merged with wildcard subscribers, dispatch ordered
    fn snapshot(&self, topic: &str) -> Vec<Subscription> {
        let map = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let mut merged: Vec<Subscription> = map.get(topic).cloned().unwrap_or_default();
        if topic != topics::ALL {
            if let Some(wildcard) = map.get(topics::ALL) {
                merged.extend(wildcard.iter().cloned());
                // Ids grow monotonically, so they stand in for registration order
                merged.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
            }
        }
        merged
    }
}
