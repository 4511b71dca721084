//! Per-user event bus (spec §3, §4.1).
//!
//! Each connected SSE client owns an unbounded mpsc FIFO registered under
//! its user id. Emitting an event fans it out to every registered
//! connection for that user whose filter matches; a dropped receiver is
//! pruned rather than allowed to block the emitter.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub event_type: String,
    pub content: Value,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, content: Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            content,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A subscriber-supplied predicate over the event stream. Absent or empty
/// fields impose no restriction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub event_types: Option<HashSet<String>>,
    #[serde(default)]
    pub metadata_filters: HashMap<String, HashSet<String>>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(types) = &self.event_types {
            if !types.is_empty() && !types.contains(&event.event_type) {
                return false;
            }
        }
        for (key, allowed) in &self.metadata_filters {
            if allowed.is_empty() {
                continue;
            }
            match event.metadata.get(key) {
                Some(value) if allowed.contains(value) => {}
                _ => return false,
            }
        }
        true
    }
}

struct Subscription {
    filter: EventFilter,
    sender: mpsc::UnboundedSender<Event>,
}

/// In-process, single-node event bus. Not durable: events emitted while a
/// user has no live connection are simply not delivered (spec §1 non-goal).
#[derive(Debug, Default)]
pub struct EventBus {
    subscriptions: DashMap<Uuid, Vec<Subscription>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("filter", &self.filter).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self { subscriptions: DashMap::new() }
    }

    /// Registers a new connection for `user_id` and returns the receiving
    /// half of its FIFO. The caller drives delivery (typically by forwarding
    /// into an SSE body stream).
    pub fn subscribe(&self, user_id: Uuid, filter: EventFilter) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions
            .entry(user_id)
            .or_default()
            .push(Subscription { filter, sender: tx });
        rx
    }

    /// Publishes `event` to every connection registered for `user_id` whose
    /// filter matches. Connections whose receiver has been dropped are
    /// pruned.
    pub fn publish(&self, user_id: Uuid, event: Event) {
        let Some(mut subs) = self.subscriptions.get_mut(&user_id) else {
            return;
        };
        subs.retain(|sub| !sub.filter.matches(&event) || sub.sender.send(event.clone()).is_ok());
    }

    /// Drops all connections for a user, e.g. once their task reaches a
    /// terminal state and the caller tears down the SSE endpoint.
    pub fn clear(&self, user_id: Uuid) {
        self.subscriptions.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_empty_matches_everything() {
        let filter = EventFilter::default();
        let event = Event::new("task_completed", Value::Null);
        assert!(filter.matches(&event));
    }

    #[test]
    fn filter_rejects_unlisted_event_type() {
        let filter = EventFilter {
            event_types: Some(HashSet::from(["task_completed".to_string()])),
            metadata_filters: HashMap::new(),
        };
        let event = Event::new("step_completed", Value::Null);
        assert!(!filter.matches(&event));
    }

    #[test]
    fn filter_requires_metadata_membership() {
        let filter = EventFilter {
            event_types: None,
            metadata_filters: HashMap::from([(
                "task_id".to_string(),
                HashSet::from(["abc".to_string()]),
            )]),
        };
        let matching = Event::new("step_completed", Value::Null)
            .with_metadata("task_id", "abc");
        let non_matching = Event::new("step_completed", Value::Null)
            .with_metadata("task_id", "xyz");
        assert!(filter.matches(&matching));
        assert!(!filter.matches(&non_matching));
    }

    #[tokio::test]
    async fn publish_delivers_to_matching_subscriber_only() {
        let bus = EventBus::new();
        let user_id = Uuid::new_v4();
        let mut rx = bus.subscribe(
            user_id,
            EventFilter {
                event_types: Some(HashSet::from(["task_completed".to_string()])),
                metadata_filters: HashMap::new(),
            },
        );

        bus.publish(user_id, Event::new("step_completed", Value::Null));
        bus.publish(user_id, Event::new("task_completed", Value::Null));

        let received = rx.recv().await.expect("event delivered");
        assert_eq!(received.event_type, "task_completed");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn two_connections_for_the_same_user_receive_independently() {
        let bus = EventBus::new();
        let user_id = Uuid::new_v4();
        let mut filtered = bus.subscribe(
            user_id,
            EventFilter {
                event_types: Some(HashSet::from(["task.completed".to_string()])),
                metadata_filters: HashMap::new(),
            },
        );
        let mut unfiltered = bus.subscribe(user_id, EventFilter::default());

        bus.publish(user_id, Event::new("task.created", Value::Null));
        bus.publish(user_id, Event::new("task.completed", Value::Null));

        let only = filtered.recv().await.expect("event delivered");
        assert_eq!(only.event_type, "task.completed");
        assert!(filtered.try_recv().is_err());

        let first = unfiltered.recv().await.expect("event delivered");
        assert_eq!(first.event_type, "task.created");
        let second = unfiltered.recv().await.expect("event delivered");
        assert_eq!(second.event_type, "task.completed");
    }

    #[tokio::test]
    async fn clear_drops_connection() {
        let bus = EventBus::new();
        let user_id = Uuid::new_v4();
        let mut rx = bus.subscribe(user_id, EventFilter::default());
        bus.clear(user_id);
        bus.publish(user_id, Event::new("task_completed", Value::Null));
        assert!(rx.recv().await.is_none());
    }
}
