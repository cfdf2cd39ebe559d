//! Generic typed event bus: per-subscriber bounded channels, filtered
//! subscriptions, and three backpressure policies.
//!
//! Unlike a broadcast channel, every subscriber owns its own buffer, so a
//! slow subscriber configured with `Overflow::Block` can apply backpressure
//! to publishers without affecting any other subscriber.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify, RwLock};
use uuid::Uuid;

use crate::domain::errors::{CoordinationError, CoordinationResult};

pub type EventId = Uuid;

/// How a subscriber's buffer behaves once it reaches capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Publishers wait for room. The default; never silently drops an event.
    Block,
    /// The oldest buffered event is evicted to make room for the new one.
    DropOldest,
    /// A new event of the same type as the most recently buffered one
    /// replaces it in place, rather than growing the buffer.
    Coalesce,
}

#[derive(Debug, Clone, Copy)]
pub struct EventBusConfig {
    pub capacity: usize,
    pub overflow: Overflow,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            overflow: Overflow::Block,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Envelope<E, P> {
    pub id: EventId,
    pub event_type: E,
    pub timestamp: DateTime<Utc>,
    pub payload: P,
}

/// Constraints a subscription applies to incoming envelopes. All specified
/// constraints must match.
pub struct EventFilter<E, P> {
    pub types: Option<Vec<E>>,
    pub predicate: Option<Arc<dyn Fn(&P) -> bool + Send + Sync>>,
    pub max_age: Option<Duration>,
}

impl<E, P> Clone for EventFilter<E, P>
where
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            types: self.types.clone(),
            predicate: self.predicate.clone(),
            max_age: self.max_age,
        }
    }
}

impl<E, P> Default for EventFilter<E, P> {
    fn default() -> Self {
        Self {
            types: None,
            predicate: None,
            max_age: None,
        }
    }
}

impl<E: PartialEq, P> EventFilter<E, P> {
    pub fn matches(&self, envelope: &Envelope<E, P>) -> bool {
        if let Some(types) = &self.types {
            if !types.iter().any(|t| *t == envelope.event_type) {
                return false;
            }
        }
        if let Some(predicate) = &self.predicate {
            if !predicate(&envelope.payload) {
                return false;
            }
        }
        if let Some(max_age) = self.max_age {
            let age = Utc::now().signed_duration_since(envelope.timestamp);
            if age > chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX) {
                return false;
            }
        }
        true
    }
}

struct SubscriberState<E, P> {
    buffer: Mutex<VecDeque<Envelope<E, P>>>,
    // Each has exactly one waiter at a time (the subscription's `recv`, or
    // whichever single publisher is currently blocked on this subscriber),
    // so `notify_one` is correct and also stores a permit for a waiter that
    // hasn't called `.notified()` yet, unlike `notify_waiters`.
    item_available: Notify,
    space_available: Notify,
    closed: AtomicBool,
    capacity: usize,
    overflow: Overflow,
    filter: EventFilter<E, P>,
}

/// Caller-owned handle to a live subscription. Dropping it, or calling
/// `cancel()`, ends delivery without an observable error.
pub struct Subscription<E, P> {
    id: u64,
    state: Arc<SubscriberState<E, P>>,
    bus: Arc<BusInner<E, P>>,
}

impl<E: Clone + PartialEq, P: Clone> Subscription<E, P> {
    /// Await the next matching envelope. Returns `None` once the bus or
    /// this subscription is closed and no buffered items remain.
    pub async fn recv(&mut self) -> Option<Envelope<E, P>> {
        loop {
            {
                let mut buffer = self.state.buffer.lock().await;
                if let Some(envelope) = buffer.pop_front() {
                    self.state.space_available.notify_one();
                    return Some(envelope);
                }
            }
            if self.state.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.state.item_available.notified().await;
        }
    }

    /// Non-blocking check for a buffered envelope.
    pub async fn try_recv(&mut self) -> Option<Envelope<E, P>> {
        let mut buffer = self.state.buffer.lock().await;
        let item = buffer.pop_front();
        if item.is_some() {
            self.state.space_available.notify_one();
        }
        item
    }

    pub fn cancel(self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.item_available.notify_one();
    }
}

impl<E, P> Drop for Subscription<E, P> {
    fn drop(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.item_available.notify_one();
        self.bus.remove(self.id);
    }
}

struct BusInner<E, P> {
    subscribers: RwLock<Vec<(u64, Arc<SubscriberState<E, P>>)>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    default_config: EventBusConfig,
}

impl<E, P> BusInner<E, P> {
    fn remove(&self, id: u64) {
        if let Ok(mut guard) = self.subscribers.try_write() {
            guard.retain(|(sid, _)| *sid != id);
        }
    }
}

/// A bus for one `(EventType, Payload)` pair. Clone is cheap (`Arc` inside).
pub struct EventBus<E, P> {
    inner: Arc<BusInner<E, P>>,
}

impl<E, P> Clone for EventBus<E, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E, P> EventBus<E, P>
where
    E: Clone + PartialEq + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    pub fn new(default_config: EventBusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                default_config,
            }),
        }
    }

    pub async fn subscribe(&self, filter: EventFilter<E, P>) -> Subscription<E, P> {
        self.subscribe_with_config(filter, self.inner.default_config).await
    }

    pub async fn subscribe_with_config(&self, filter: EventFilter<E, P>, config: EventBusConfig) -> Subscription<E, P> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let state = Arc::new(SubscriberState {
            buffer: Mutex::new(VecDeque::with_capacity(config.capacity.min(256))),
            item_available: Notify::new(),
            space_available: Notify::new(),
            closed: AtomicBool::new(false),
            capacity: config.capacity.max(1),
            overflow: config.overflow,
            filter,
        });

        self.inner.subscribers.write().await.push((id, state.clone()));

        Subscription {
            id,
            state,
            bus: self.inner.clone(),
        }
    }

    pub async fn publish(&self, event_type: E, payload: P) -> CoordinationResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(CoordinationError::Fatal("event bus is shut down".into()));
        }

        let envelope = Envelope {
            id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            payload,
        };

        let targets: Vec<Arc<SubscriberState<E, P>>> = {
            let guard = self.inner.subscribers.read().await;
            guard
                .iter()
                .filter(|(_, state)| !state.closed.load(Ordering::SeqCst))
                .filter(|(_, state)| state.filter.matches(&envelope))
                .map(|(_, state)| state.clone())
                .collect()
        };

        for state in targets {
            deliver(&state, envelope.clone()).await;
        }

        Ok(())
    }

    /// Disposes the bus: further `publish` calls fail, and every live
    /// subscription's stream ends cleanly.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let guard = self.inner.subscribers.read().await;
        for (_, state) in guard.iter() {
            state.closed.store(true, Ordering::SeqCst);
            state.item_available.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestEvent {
        A,
        B,
    }

    async fn bus(capacity: usize, overflow: Overflow) -> EventBus<TestEvent, u32> {
        EventBus::new(EventBusConfig { capacity, overflow })
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let bus = bus(8, Overflow::Block).await;
        let mut sub = bus.subscribe(EventFilter::default()).await;

        bus.publish(TestEvent::A, 1).await.unwrap();
        bus.publish(TestEvent::A, 2).await.unwrap();

        assert_eq!(sub.recv().await.unwrap().payload, 1);
        assert_eq!(sub.recv().await.unwrap().payload, 2);
    }

    #[tokio::test]
    async fn filter_by_event_type_excludes_other_types() {
        let bus = bus(8, Overflow::Block).await;
        let mut sub = bus
            .subscribe(EventFilter {
                types: Some(vec![TestEvent::A]),
                predicate: None,
                max_age: None,
            })
            .await;

        bus.publish(TestEvent::B, 1).await.unwrap();
        bus.publish(TestEvent::A, 2).await.unwrap();

        let received = sub.recv().await.unwrap();
        assert_eq!(received.event_type, TestEvent::A);
        assert_eq!(received.payload, 2);
    }

    #[tokio::test]
    async fn filter_by_predicate_only_matches_satisfying_payloads() {
        let bus = bus(8, Overflow::Block).await;
        let mut sub = bus
            .subscribe(EventFilter {
                types: None,
                predicate: Some(Arc::new(|p: &u32| *p > 10)),
                max_age: None,
            })
            .await;

        bus.publish(TestEvent::A, 1).await.unwrap();
        bus.publish(TestEvent::A, 20).await.unwrap();

        assert_eq!(sub.recv().await.unwrap().payload, 20);
    }

    #[tokio::test]
    async fn drop_oldest_evicts_the_earliest_buffered_event_once_full() {
        let bus = bus(2, Overflow::DropOldest).await;
        let mut sub = bus.subscribe(EventFilter::default()).await;

        bus.publish(TestEvent::A, 1).await.unwrap();
        bus.publish(TestEvent::A, 2).await.unwrap();
        bus.publish(TestEvent::A, 3).await.unwrap();

        assert_eq!(sub.recv().await.unwrap().payload, 2);
        assert_eq!(sub.recv().await.unwrap().payload, 3);
    }

    #[tokio::test]
    async fn coalesce_replaces_the_most_recent_buffered_event_once_full() {
        let bus = bus(1, Overflow::Coalesce).await;
        let mut sub = bus.subscribe(EventFilter::default()).await;

        bus.publish(TestEvent::A, 1).await.unwrap();
        bus.publish(TestEvent::A, 2).await.unwrap();

        let received = sub.recv().await.unwrap();
        assert_eq!(received.payload, 2);
        assert!(sub.try_recv().await.is_none());
    }

    #[tokio::test]
    async fn block_policy_makes_a_publisher_wait_for_buffer_space() {
        let bus = bus(1, Overflow::Block).await;
        let mut sub = bus.subscribe(EventFilter::default()).await;

        bus.publish(TestEvent::A, 1).await.unwrap();

        let bus_clone = bus.clone();
        let blocked = tokio::spawn(async move { bus_clone.publish(TestEvent::A, 2).await });

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(!blocked.is_finished(), "publish should still be blocked on a full buffer");

        assert_eq!(sub.recv().await.unwrap().payload, 1);
        blocked.await.unwrap().unwrap();
        assert_eq!(sub.recv().await.unwrap().payload, 2);
    }

    #[tokio::test]
    async fn cancelling_a_subscription_ends_recv_with_none() {
        let bus = bus(8, Overflow::Block).await;
        let mut sub = bus.subscribe(EventFilter::default()).await;
        sub.cancel();
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_every_subscription_still_lets_publish_succeed() {
        let bus = bus(8, Overflow::Block).await;
        {
            let _sub = bus.subscribe(EventFilter::default()).await;
        }
        bus.publish(TestEvent::A, 1).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_ends_live_subscriptions_and_rejects_further_publishes() {
        let bus = bus(8, Overflow::Block).await;
        let mut sub = bus.subscribe(EventFilter::default()).await;

        bus.shutdown().await;

        assert!(bus.publish(TestEvent::A, 1).await.is_err());
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn max_age_filter_drops_events_older_than_the_window() {
        let bus = bus(8, Overflow::Block).await;
        let mut sub = bus
            .subscribe(EventFilter {
                types: None,
                predicate: None,
                max_age: Some(StdDuration::from_secs(3600)),
            })
            .await;

        bus.publish(TestEvent::A, 1).await.unwrap();
        let received = sub.recv().await.unwrap();
        assert_eq!(received.payload, 1);
    }
}

async fn deliver<E: Clone, P: Clone>(state: &Arc<SubscriberState<E, P>>, envelope: Envelope<E, P>) {
    match state.overflow {
        Overflow::Block => loop {
            {
                let mut buffer = state.buffer.lock().await;
                if buffer.len() < state.capacity {
                    buffer.push_back(envelope);
                    state.item_available.notify_one();
                    return;
                }
            }
            if state.closed.load(Ordering::SeqCst) {
                return;
            }
            state.space_available.notified().await;
        },
        Overflow::DropOldest => {
            let mut buffer = state.buffer.lock().await;
            if buffer.len() >= state.capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope);
            state.item_available.notify_one();
        }
        Overflow::Coalesce => {
            let mut buffer = state.buffer.lock().await;
            if buffer.len() >= state.capacity {
                if let Some(last) = buffer.back_mut() {
                    last.payload = envelope.payload;
                    last.timestamp = envelope.timestamp;
                    last.id = envelope.id;
                } else {
                    buffer.push_back(envelope);
                }
            } else {
                buffer.push_back(envelope);
            }
            state.item_available.notify_one();
        }
    }
}
