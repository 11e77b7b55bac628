//! # Distribution Broker
//!
//! Fan-out hub between the reader loop and an arbitrary number of display
//! consumers.
//!
//! Each subscriber owns a bounded inbox. `publish` never blocks: when an
//! inbox is full the oldest queued update is evicted to admit the new one
//! (drop-oldest — a live dashboard wants the freshest data, not a complete
//! history). Delivery is FIFO per subscriber; subscribers are fully isolated
//! from each other, so a stalled consumer cannot slow the reader or starve
//! its peers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::frame::{DecodeFailure, TelemetryRecord};
use crate::quality::PacketQualitySnapshot;

/// Default per-subscriber inbox capacity
pub const DEFAULT_INBOX_CAPACITY: usize = 256;

/// Everything a consumer may want to know about one incoming line
///
/// Published once per line: the raw text for verbatim display, the decode
/// outcome for typed access, and the quality counters as of this line.
/// Consumers never call back into the reader or tracker.
#[derive(Debug, Clone)]
pub struct TelemetryUpdate {
    /// The raw line as received (trailing newline stripped)
    pub raw: String,
    /// Decoded record, or the tagged failure for malformed lines
    pub decoded: Result<TelemetryRecord, DecodeFailure>,
    /// Quality counters after this line was observed
    pub quality: PacketQualitySnapshot,
}

/// Per-subscriber bounded inbox
struct Inbox {
    queue: Mutex<VecDeque<Arc<TelemetryUpdate>>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
}

impl Inbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue without blocking, evicting the oldest item when full
    fn push(&self, update: Arc<TelemetryUpdate>) {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() == self.capacity {
            queue.pop_front();
            trace!("inbox full, dropped oldest update");
        }
        queue.push_back(update);
        drop(queue);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Arc<TelemetryUpdate>> {
        self.queue.lock().unwrap().pop_front()
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }
}

/// Handle representing one consumer's registration with the broker
///
/// Dropping the subscription unsubscribes; pending updates are discarded.
pub struct Subscription {
    id: u64,
    inbox: Arc<Inbox>,
    broker: Weak<BrokerShared>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Subscription {
    /// Receive the next update, waiting if the inbox is empty
    ///
    /// Returns `None` once the broker has been closed and the inbox drained.
    pub async fn recv(&mut self) -> Option<Arc<TelemetryUpdate>> {
        loop {
            if let Some(update) = self.inbox.pop() {
                return Some(update);
            }
            if self.inbox.closed.load(Ordering::Acquire) {
                return None;
            }
            self.inbox.notified().await;
        }
    }

    /// Receive the next update if one is already queued
    pub fn try_recv(&mut self) -> Option<Arc<TelemetryUpdate>> {
        self.inbox.pop()
    }

    /// Number of updates currently queued
    pub fn pending(&self) -> usize {
        self.inbox.queue.lock().unwrap().len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broker) = self.broker.upgrade() {
            broker.remove(self.id);
        }
    }
}

struct BrokerShared {
    subscribers: Mutex<Vec<(u64, Arc<Inbox>)>>,
    next_id: AtomicU64,
    capacity: usize,
    closed: AtomicBool,
}

impl BrokerShared {
    fn remove(&self, id: u64) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|(sub_id, _)| *sub_id != id);
        debug!(subscriber = id, remaining = subs.len(), "unsubscribed");
    }
}

/// Fan-out hub; cheap to clone handles via `Arc`
///
/// Constructed explicitly and passed to the reader loop and to consumers —
/// no process-wide singletons.
pub struct TelemetryBroker {
    shared: Arc<BrokerShared>,
}

impl std::fmt::Debug for TelemetryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBroker")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl TelemetryBroker {
    /// Create a broker whose subscriptions hold up to `inbox_capacity`
    /// pending updates each
    pub fn new(inbox_capacity: usize) -> Self {
        Self {
            shared: Arc::new(BrokerShared {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                capacity: inbox_capacity.max(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a new consumer
    ///
    /// New subscriptions are accepted at any time, including mid-stream;
    /// they see only updates published after registration.
    pub fn subscribe(&self) -> Subscription {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let inbox = Arc::new(Inbox::new(self.shared.capacity));
        if self.shared.closed.load(Ordering::Acquire) {
            // Late subscriber to a closed broker drains straight to None.
            inbox.close();
        }

        let mut subs = self.shared.subscribers.lock().unwrap();
        subs.push((id, Arc::clone(&inbox)));
        debug!(subscriber = id, total = subs.len(), "subscribed");
        drop(subs);

        Subscription {
            id,
            inbox,
            broker: Arc::downgrade(&self.shared),
        }
    }

    /// Deliver one update to every current subscriber
    ///
    /// Non-blocking and bounded-time: each inbox enqueue either appends or
    /// evicts that inbox's oldest item first. Publishes after
    /// [`close`](TelemetryBroker::close) are silently dropped.
    pub fn publish(&self, update: TelemetryUpdate) {
        if self.shared.closed.load(Ordering::Acquire) {
            return;
        }

        let update = Arc::new(update);
        let subs = self.shared.subscribers.lock().unwrap();
        for (_, inbox) in subs.iter() {
            inbox.push(Arc::clone(&update));
        }
    }

    /// Stop accepting publishes and wake every subscriber
    ///
    /// Queued updates remain receivable; `recv` returns `None` once each
    /// inbox is drained. Idempotent.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        let subs = self.shared.subscribers.lock().unwrap();
        for (_, inbox) in subs.iter() {
            inbox.close();
        }
        debug!(subscribers = subs.len(), "broker closed");
    }

    /// Number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().unwrap().len()
    }

    /// New handle to the same broker
    pub fn handle(&self) -> TelemetryBroker {
        TelemetryBroker { shared: Arc::clone(&self.shared) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::decode;
    use crate::quality::PacketQualityTracker;

    fn update(raw: &str) -> TelemetryUpdate {
        let mut tracker = PacketQualityTracker::new();
        TelemetryUpdate {
            raw: raw.to_string(),
            decoded: decode(raw),
            quality: tracker.observe(raw),
        }
    }

    fn numbered_update(n: usize) -> TelemetryUpdate {
        update(&format!("T1,00:00:01,{},extra", n))
    }

    #[test]
    fn test_drop_oldest_keeps_last_k_in_order() {
        let broker = TelemetryBroker::new(3);
        let mut sub = broker.subscribe();

        for n in 0..10 {
            broker.publish(numbered_update(n));
        }

        // Capacity 3, 10 published, nothing consumed: exactly the last 3
        // remain, in publish order.
        assert_eq!(sub.pending(), 3);
        for expected in 7..10 {
            let got = sub.try_recv().unwrap();
            assert_eq!(got.raw, format!("T1,00:00:01,{},extra", expected));
        }
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_blocked_subscriber_does_not_affect_active_one() {
        let broker = TelemetryBroker::new(2);
        let mut blocked = broker.subscribe();
        let mut active = broker.subscribe();

        for n in 0..20 {
            broker.publish(numbered_update(n));
            // Active consumer keeps up; blocked one never drains.
            let got = active.try_recv().unwrap();
            assert_eq!(got.raw, format!("T1,00:00:01,{},extra", n));
        }

        // The blocked inbox saturated at its capacity without ever stalling
        // publish or the active subscriber.
        assert_eq!(blocked.pending(), 2);
        assert!(active.try_recv().is_none());
    }

    #[test]
    fn test_subscribe_mid_stream_sees_only_later_updates() {
        let broker = TelemetryBroker::new(8);
        broker.publish(numbered_update(0));

        let mut late = broker.subscribe();
        broker.publish(numbered_update(1));

        let got = late.try_recv().unwrap();
        assert_eq!(got.raw, "T1,00:00:01,1,extra");
        assert!(late.try_recv().is_none());
    }

    #[test]
    fn test_unsubscribe_on_drop() {
        let broker = TelemetryBroker::new(4);
        let sub = broker.subscribe();
        assert_eq!(broker.subscriber_count(), 1);

        drop(sub);
        assert_eq!(broker.subscriber_count(), 0);

        // Publishing into an empty broker is a no-op, not an error.
        broker.publish(numbered_update(0));
    }

    #[test]
    fn test_publish_after_close_is_dropped() {
        let broker = TelemetryBroker::new(4);
        let mut sub = broker.subscribe();

        broker.publish(numbered_update(0));
        broker.close();
        broker.publish(numbered_update(1));

        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_recv_returns_none_after_close_and_drain() {
        tokio_test::block_on(async {
            let broker = TelemetryBroker::new(4);
            let mut sub = broker.subscribe();

            broker.publish(numbered_update(0));
            broker.close();

            assert_eq!(sub.recv().await.unwrap().raw, "T1,00:00:01,0,extra");
            assert!(sub.recv().await.is_none());
        });
    }

    #[tokio::test]
    async fn test_recv_wakes_on_publish() {
        let broker = TelemetryBroker::new(4);
        let mut sub = broker.subscribe();
        let publisher = broker.handle();

        let waiter = tokio::spawn(async move { sub.recv().await });

        // Give the receiver a chance to park before publishing.
        tokio::task::yield_now().await;
        publisher.publish(numbered_update(42));

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.raw, "T1,00:00:01,42,extra");
    }

    #[test]
    fn test_updates_are_shared_not_copied() {
        let broker = TelemetryBroker::new(4);
        let mut a = broker.subscribe();
        let mut b = broker.subscribe();

        broker.publish(numbered_update(0));

        let from_a = a.try_recv().unwrap();
        let from_b = b.try_recv().unwrap();
        assert!(Arc::ptr_eq(&from_a, &from_b));
    }
}
