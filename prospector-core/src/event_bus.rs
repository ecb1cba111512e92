//! In-process topic registry fanning crawler events out to live stream
//! sessions.
//!
//! Every subscriber owns a bounded queue. Publishing never waits on a
//! subscriber: the subscriber list is snapshotted under the structural lock,
//! the lock is released, and each queue gets a `try_send`. A full queue loses
//! that event; the publisher and the other subscribers are unaffected.

use std::{
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use crate::types::CrawlerEvent;

pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving half handed to a subscriber. Dropping it without calling
/// [`CrawlerEventBus::unsubscribe`] leaves a dead queue on the topic until the
/// owner unsubscribes, so sessions pair it with a guard.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    topic: String,
    receiver: mpsc::Receiver<CrawlerEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next event, or `None` once the queue was closed by `unsubscribe`.
    pub async fn recv(&mut self) -> Option<CrawlerEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<CrawlerEvent> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<CrawlerEvent>,
}

pub struct CrawlerEventBus {
    topics: Mutex<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl fmt::Debug for CrawlerEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.topics.try_lock().map(|guard| guard.len());
        f.debug_struct("CrawlerEventBus")
            .field("topics", &topics)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for CrawlerEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl CrawlerEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscribe(&self, topic: &str) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (sender, receiver) = mpsc::channel(self.capacity);

        self.topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, sender });

        debug!(topic, subscriber = %id, "subscribed to crawler topic");
        Subscription {
            id,
            topic: topic.to_string(),
            receiver,
        }
    }

    /// Removes and closes the subscriber's queue. Returns `false` when the
    /// subscriber was already gone.
    pub fn unsubscribe(&self, topic: &str, id: SubscriberId) -> bool {
        let mut topics = self.topics.lock();
        let Some(subscribers) = topics.get_mut(topic) else {
            return false;
        };

        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        let removed = subscribers.len() != before;

        if subscribers.is_empty() {
            topics.remove(topic);
        }
        drop(topics);

        if removed {
            debug!(topic, subscriber = %id, "unsubscribed from crawler topic");
        }
        removed
    }

    /// Delivers `event` to everyone currently on `topic` and returns how many
    /// queues accepted it.
    pub fn publish(&self, topic: &str, event: CrawlerEvent) -> usize {
        let targets: Vec<(SubscriberId, mpsc::Sender<CrawlerEvent>)> = {
            let topics = self.topics.lock();
            match topics.get(topic) {
                Some(subscribers) => subscribers
                    .iter()
                    .map(|subscriber| (subscriber.id, subscriber.sender.clone()))
                    .collect(),
                None => return 0,
            }
        };

        let kind = event.event_type();
        let mut delivered = 0;
        for (id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(topic, subscriber = %id, event = %kind, "subscriber queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(topic, subscriber = %id, "subscriber queue closed");
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map(Vec::len).unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.lock().len()
    }
}
