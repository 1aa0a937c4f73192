//! In-process publish/subscribe bus.
//!
//! One `tokio::sync::broadcast` sender per topic. Each subscriber gets its own
//! task that drains its receiver in publish order and hands payloads to a
//! handler. Nothing is persisted; a subscriber that falls behind by more than
//! the channel capacity loses the oldest events and logs how many.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{topics, CHANNEL_CAPACITY};
use crate::types::SessionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    GameOrSessionChosen,
    PitchColorDidChange,
    JerseyOrderChanged,
    GameOrSessionDeleted,
    PracticeProgressReset,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::GameOrSessionChosen => topics::GAME_OR_SESSION_CHOSEN,
            Topic::PitchColorDidChange => topics::PITCH_COLOR_DID_CHANGE,
            Topic::JerseyOrderChanged => topics::JERSEY_ORDER_CHANGED,
            Topic::GameOrSessionDeleted => topics::GAME_OR_SESSION_DELETED,
            Topic::PracticeProgressReset => topics::PRACTICE_PROGRESS_RESET,
        }
    }

    /// Kebab-case form used in HTTP paths.
    pub fn slug(&self) -> &'static str {
        match self {
            Topic::GameOrSessionChosen => "game-or-session-chosen",
            Topic::PitchColorDidChange => "pitch-color-did-change",
            Topic::JerseyOrderChanged => "jersey-order-changed",
            Topic::GameOrSessionDeleted => "game-or-session-deleted",
            Topic::PracticeProgressReset => "practice-progress-reset",
        }
    }

    /// Accepts either the bus name or its slug.
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Topic::GameOrSessionChosen,
            Topic::PitchColorDidChange,
            Topic::JerseyOrderChanged,
            Topic::GameOrSessionDeleted,
            Topic::PracticeProgressReset,
        ]
        .into_iter()
        .find(|t| t.as_str() == name || t.slug() == name)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BusPayload {
    Session(SessionEvent),
    /// Opaque payload for topics only the presentation layer understands.
    Notice(serde_json::Value),
}

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Owned handle to a running subscriber. Closing (or dropping) it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    topic: Topic,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn is_closed(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(subscription = self.id, topic = %self.topic, "subscription closed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Default)]
pub struct EventBus {
    senders: DashMap<Topic, broadcast::Sender<BusPayload>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: Topic) -> broadcast::Sender<BusPayload> {
        self.senders
            .entry(topic)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Returns how many subscribers the payload was queued for.
    pub fn publish(&self, topic: Topic, payload: BusPayload) -> usize {
        match self.sender(topic).send(payload) {
            Ok(n) => n,
            Err(_) => {
                debug!(topic = %topic, "published with no subscribers");
                0
            }
        }
    }

    /// Spawns a task feeding every payload on `topic` to `handler`, in publish order.
    /// Must be called inside a tokio runtime.
    pub fn subscribe<F>(&self, topic: Topic, mut handler: F) -> Subscription
    where
        F: FnMut(BusPayload) + Send + 'static,
    {
        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        let mut rx = self.sender(topic).subscribe();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => handler(payload),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(subscription = id, topic = %topic, skipped, "subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        debug!(subscription = id, topic = %topic, "subscribed");
        Subscription { id, topic, task: Some(task) }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.senders.get(&topic).map_or(0, |s| s.receiver_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bus.subscribe(Topic::GameOrSessionChosen, move |p| {
            let _ = tx.send(p);
        });

        for code in ["111111", "222222", "333333"] {
            bus.publish(Topic::GameOrSessionChosen, BusPayload::Session(SessionEvent::code(code)));
        }

        for code in ["111111", "222222", "333333"] {
            let got = rx.recv().await.unwrap();
            assert_eq!(got, BusPayload::Session(SessionEvent::code(code)));
        }
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bus.subscribe(Topic::GameOrSessionChosen, move |p| {
            let _ = tx.send(p);
        });

        bus.publish(Topic::JerseyOrderChanged, BusPayload::Notice(serde_json::json!({ "order": [3, 1] })));
        let nothing = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn closing_stops_delivery() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = bus.subscribe(Topic::GameOrSessionChosen, move |p| {
            let _ = tx.send(p);
        });
        sub.close();
        tokio::task::yield_now().await;

        bus.publish(Topic::GameOrSessionChosen, BusPayload::Session(SessionEvent::code("123456")));
        // The handler (and its sender) is gone once the task is aborted.
        let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(matches!(got, Ok(None)));
    }

    #[test]
    fn topic_names_round_trip() {
        assert_eq!(Topic::from_name("gameOrSessionChosen"), Some(Topic::GameOrSessionChosen));
        assert_eq!(Topic::from_name("practiceProgressReset"), Some(Topic::PracticeProgressReset));
        assert_eq!(Topic::from_name("game-or-session-chosen"), Some(Topic::GameOrSessionChosen));
        assert_eq!(Topic::from_name("jersey-order-changed"), Some(Topic::JerseyOrderChanged));
        assert_eq!(Topic::from_name("nope"), None);
    }
}
