//! Event Bus - topic-addressed fan-out pub/sub
//!
//! Every `subscribe` call gets its own bounded queue. Publishing enqueues the
//! event into every current subscriber queue of that topic. A full queue gets
//! a short `send_timeout`; if that expires the event is dropped for that one
//! subscriber and `failed_deliveries` is bumped.
//!
//! Deliveries on one topic are serialized by a per-topic async lock, which is
//! what gives each subscriber FIFO order per topic.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::error::BusError;
use super::topic::Topic;
use super::types::Event;
use crate::config::BusConfig;

/// Subscriber queue registered under one or more topics
#[derive(Clone)]
struct SubscriberSlot {
    id: u64,
    tx: mpsc::Sender<Event>,
}

/// Per-topic subscriber list plus its delivery lock
#[derive(Default)]
struct TopicChannel {
    subscribers: Mutex<Vec<SubscriberSlot>>,
    /// Held for the whole fan-out of one event
    delivery_lock: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct BusCounters {
    published: AtomicU64,
    delivered: AtomicU64,
    failed_deliveries: AtomicU64,
    pruned_subscribers: AtomicU64,
}

struct BusShared {
    config: BusConfig,
    topics: HashMap<Topic, TopicChannel>,
    next_subscriber_id: AtomicU64,
    accepting: AtomicBool,
    history: Mutex<VecDeque<Event>>,
    counters: BusCounters,
    shutdown_tx: watch::Sender<bool>,
}

/// Lock a std mutex, recovering the data if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BusShared {
    fn channel(&self, topic: Topic) -> Result<&TopicChannel, BusError> {
        self.topics
            .get(&topic)
            .ok_or_else(|| BusError::UnknownTopic(topic.to_string()))
    }

    fn remove_subscriber(&self, id: u64, topics: &[Topic]) {
        for topic in topics {
            if let Some(channel) = self.topics.get(topic) {
                lock(&channel.subscribers).retain(|slot| slot.id != id);
            }
        }
    }

    fn record_history(&self, event: &Event) {
        if self.config.history_size == 0 {
            return;
        }
        let mut history = lock(&self.history);
        while history.len() >= self.config.history_size {
            history.pop_front();
        }
        history.push_back(event.clone());
    }
}

/// Point-in-time bus counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct BusMetrics {
    /// Events accepted by publish
    pub published: u64,
    /// Successful enqueues (one per subscriber per event)
    pub delivered: u64,
    /// Enqueues dropped after the delivery timeout
    pub failed_deliveries: u64,
    /// Queues removed because their consumer went away
    pub pruned_subscribers: u64,
    /// Live subscriber queues per topic
    pub subscribers_per_topic: HashMap<String, usize>,
    /// Events currently held in the debug ring buffer
    pub history_len: usize,
    /// False once shutdown has started
    pub accepting: bool,
}

/// Central event bus
///
/// Cheap to clone; every clone refers to the same bus.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<BusShared>,
}

impl EventBus {
    /// Create a bus with every catalog topic registered
    pub fn new(config: BusConfig) -> Self {
        debug!(
            queue_capacity = config.queue_capacity,
            delivery_timeout_ms = config.delivery_timeout_ms,
            history_size = config.history_size,
            "EventBus::new: creating event bus"
        );
        let topics = Topic::ALL.iter().map(|t| (*t, TopicChannel::default())).collect();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            shared: Arc::new(BusShared {
                config,
                topics,
                next_subscriber_id: AtomicU64::new(1),
                accepting: AtomicBool::new(true),
                history: Mutex::new(VecDeque::new()),
                counters: BusCounters::default(),
                shutdown_tx,
            }),
        }
    }

    /// Create a bus with default configuration
    pub fn with_default_config() -> Self {
        Self::new(BusConfig::default())
    }

    /// Publish an event to every subscriber of its topic
    ///
    /// Returns once the event has been offered to every subscriber. A
    /// subscriber whose queue stays full past the delivery timeout misses
    /// this event; nobody else is affected.
    pub async fn publish(&self, event: Event) -> Result<(), BusError> {
        debug!(
            event_type = event.event_type(),
            session_id = %event.session_id,
            correlation_id = %event.correlation_id,
            "EventBus::publish"
        );
        if !self.shared.accepting.load(Ordering::SeqCst) {
            debug!("EventBus::publish: rejected, bus is shut down");
            return Err(BusError::Closed);
        }
        event.validate().map_err(BusError::InvalidPayload)?;

        let channel = self.shared.channel(event.topic)?;
        self.shared.record_history(&event);
        self.shared.counters.published.fetch_add(1, Ordering::Relaxed);

        let _order = channel.delivery_lock.lock().await;
        let targets: Vec<SubscriberSlot> = lock(&channel.subscribers).clone();
        let timeout = self.shared.config.delivery_timeout();
        let mut closed = Vec::new();

        for slot in targets {
            match slot.tx.try_send(event.clone()) {
                Ok(()) => {
                    self.shared.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(event)) => match slot.tx.send_timeout(event, timeout).await {
                    Ok(()) => {
                        self.shared.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(SendTimeoutError::Timeout(event)) => {
                        self.shared.counters.failed_deliveries.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            subscriber_id = slot.id,
                            topic = %event.topic,
                            event_id = %event.event_id,
                            ?timeout,
                            "EventBus: subscriber queue full, dropping event"
                        );
                    }
                    Err(SendTimeoutError::Closed(_)) => closed.push(slot.id),
                },
                Err(TrySendError::Closed(_)) => closed.push(slot.id),
            }
        }

        if !closed.is_empty() {
            let mut subscribers = lock(&channel.subscribers);
            subscribers.retain(|slot| !closed.contains(&slot.id));
            self.shared
                .counters
                .pruned_subscribers
                .fetch_add(closed.len() as u64, Ordering::Relaxed);
            debug!(pruned = closed.len(), "EventBus::publish: pruned closed subscribers");
        }

        Ok(())
    }

    /// Publish on a topic given by name
    ///
    /// Fails with `UnknownTopic` for names outside the catalog.
    pub async fn publish_named(&self, topic: &str, event: Event) -> Result<(), BusError> {
        debug!(%topic, "EventBus::publish_named: called");
        let topic: Topic = topic.parse().map_err(|_| BusError::UnknownTopic(topic.to_string()))?;
        if topic != event.topic {
            return Err(BusError::InvalidPayload(format!(
                "event for {} published on {}",
                event.topic, topic
            )));
        }
        self.publish(event).await
    }

    /// Subscribe to one topic
    ///
    /// Only events published after this call are received.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.subscribe_topics(&[topic])
    }

    /// Subscribe to a topic given by name
    pub fn subscribe_named(&self, topic: &str) -> Result<Subscription, BusError> {
        let topic: Topic = topic.parse().map_err(|_| BusError::UnknownTopic(topic.to_string()))?;
        Ok(self.subscribe(topic))
    }

    /// Subscribe one queue to several topics
    ///
    /// Order is FIFO per topic; there is no ordering across topics.
    pub fn subscribe_topics(&self, topics: &[Topic]) -> Subscription {
        let id = self.shared.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.shared.config.queue_capacity.max(1));
        debug!(subscriber_id = id, ?topics, "EventBus::subscribe_topics: new subscriber");

        if self.shared.accepting.load(Ordering::SeqCst) {
            for topic in topics {
                if let Some(channel) = self.shared.topics.get(topic) {
                    lock(&channel.subscribers).push(SubscriberSlot { id, tx: tx.clone() });
                }
            }
        } else {
            debug!(subscriber_id = id, "EventBus::subscribe_topics: bus shut down, subscription is closed");
        }

        Subscription {
            id,
            topics: topics.to_vec(),
            rx,
            shared: Arc::downgrade(&self.shared),
            shutdown_rx: self.shared.shutdown_tx.subscribe(),
        }
    }

    /// Number of live subscriber queues on a topic
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.shared
            .topics
            .get(&topic)
            .map(|c| lock(&c.subscribers).len())
            .unwrap_or(0)
    }

    /// Number of events dropped because a queue stayed full
    pub fn failed_deliveries(&self) -> u64 {
        self.shared.counters.failed_deliveries.load(Ordering::Relaxed)
    }

    pub fn is_accepting(&self) -> bool {
        self.shared.accepting.load(Ordering::SeqCst)
    }

    /// Most recent events from the debug ring buffer (oldest first)
    ///
    /// `session_id = None` returns events from every session.
    pub fn recent_events(&self, session_id: Option<&str>, limit: usize) -> Vec<Event> {
        debug!(?session_id, limit, "EventBus::recent_events: called");
        let history = lock(&self.shared.history);
        let mut events: Vec<Event> = history
            .iter()
            .rev()
            .filter(|e| session_id.is_none_or(|id| e.session_id == id))
            .take(limit)
            .cloned()
            .collect();
        events.reverse();
        events
    }

    /// Snapshot of the bus counters
    pub fn metrics(&self) -> BusMetrics {
        let counters = &self.shared.counters;
        BusMetrics {
            published: counters.published.load(Ordering::Relaxed),
            delivered: counters.delivered.load(Ordering::Relaxed),
            failed_deliveries: counters.failed_deliveries.load(Ordering::Relaxed),
            pruned_subscribers: counters.pruned_subscribers.load(Ordering::Relaxed),
            subscribers_per_topic: Topic::ALL
                .iter()
                .map(|t| (t.to_string(), self.subscriber_count(*t)))
                .collect(),
            history_len: lock(&self.shared.history).len(),
            accepting: self.is_accepting(),
        }
    }

    /// Stop accepting publishes, let in-flight deliveries settle, then
    /// release every subscriber queue
    ///
    /// Waits at most `grace` for deliveries already in progress. After this
    /// returns every `Subscription` yields end-of-stream.
    pub async fn shutdown(&self, grace: Duration) {
        if !self.shared.accepting.swap(false, Ordering::SeqCst) {
            debug!("EventBus::shutdown: already shut down");
            return;
        }
        info!(?grace, "EventBus shutting down");

        let settle = async {
            for channel in self.shared.topics.values() {
                let _settled = channel.delivery_lock.lock().await;
            }
        };
        if tokio::time::timeout(grace, settle).await.is_err() {
            warn!(?grace, "EventBus::shutdown: grace period expired with deliveries in flight");
        }

        let mut released = 0;
        for channel in self.shared.topics.values() {
            let mut subscribers = lock(&channel.subscribers);
            released += subscribers.len();
            subscribers.clear();
        }
        self.shared.shutdown_tx.send_replace(true);
        info!(released, "EventBus stopped");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_config()
    }
}

/// Outcome of a bounded wait on a subscription
#[derive(Debug)]
pub enum RecvOutcome {
    Event(Box<Event>),
    /// Nothing arrived within the poll interval
    Idle,
    /// The bus shut down or went away
    Closed,
}

/// A subscriber's private delivery queue
///
/// Dropping it unsubscribes from every topic it was registered on.
pub struct Subscription {
    id: u64,
    topics: Vec<Topic>,
    rx: mpsc::Receiver<Event>,
    shared: Weak<BusShared>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Wait for the next event; `None` once the bus has shut down
    pub async fn recv(&mut self) -> Option<Event> {
        if *self.shutdown_rx.borrow() {
            return None;
        }
        tokio::select! {
            event = self.rx.recv() => event,
            _ = self.shutdown_rx.changed() => {
                debug!(subscriber_id = self.id, "Subscription::recv: bus shut down");
                None
            }
        }
    }

    /// Wait at most `poll` for the next event
    ///
    /// Agent loops use this to wake periodically and check their running flag.
    pub async fn recv_timeout(&mut self, poll: Duration) -> RecvOutcome {
        match tokio::time::timeout(poll, self.recv()).await {
            Ok(Some(event)) => RecvOutcome::Event(Box::new(event)),
            Ok(None) => RecvOutcome::Closed,
            Err(_) => RecvOutcome::Idle,
        }
    }

    /// Take an already-queued event without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Turn the subscription into a lazy stream of events
    pub fn into_stream(self) -> impl Stream<Item = Event> {
        futures::stream::unfold(self, |mut sub| async move { sub.recv().await.map(|event| (event, sub)) })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            debug!(subscriber_id = self.id, "Subscription::drop: unsubscribing");
            shared.remove_subscriber(self.id, &self.topics);
        }
    }
}
