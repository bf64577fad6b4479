//! Event fan-out for [`EngineEvent`] streams.
//!
//! UIs usually render only the root solve while the session log wants the
//! whole recursion tree, so subscriptions carry an optional depth cap and
//! each subscriber gets its own unbounded channel: a stalled renderer can
//! never block the solve or force other subscribers to drop events.
//! Receivers that went away are pruned on the next emit.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use planter_core::events::EngineEvent;

struct Subscriber {
    tx: mpsc::UnboundedSender<EngineEvent>,
    /// Deliver only events at or above this depth cap (`None` = everything).
    max_depth: Option<u32>,
}

impl Subscriber {
    fn wants(&self, event: &EngineEvent) -> bool {
        self.max_depth.is_none_or(|cap| event.base().depth <= cap)
    }
}

/// Depth-aware event fan-out.
///
/// `emit` never awaits and never fails; it reports how many subscribers
/// the event was delivered to.
pub struct EventEmitter {
    subscribers: RwLock<Vec<Subscriber>>,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Emitter with no subscribers yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            emit_count: AtomicU64::new(0),
        }
    }

    /// Subscribe to every event emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<EngineEvent> {
        self.subscribe_with_cap(None)
    }

    /// Subscribe to events at depth `max_depth` or shallower. A cap of 0
    /// yields the root solve only.
    #[must_use]
    pub fn subscribe_to_depth(&self, max_depth: u32) -> mpsc::UnboundedReceiver<EngineEvent> {
        self.subscribe_with_cap(Some(max_depth))
    }

    fn subscribe_with_cap(&self, max_depth: Option<u32>) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(Subscriber { tx, max_depth });
        rx
    }

    /// Deliver an event to every live, depth-matching subscriber. Returns
    /// the delivery count. Dropped receivers are pruned here.
    pub fn emit(&self, event: EngineEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        let mut saw_closed = false;
        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                if subscriber.tx.is_closed() {
                    saw_closed = true;
                    continue;
                }
                if !subscriber.wants(&event) {
                    continue;
                }
                if subscriber.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        if saw_closed {
            self.subscribers.write().retain(|s| !s.tx.is_closed());
        }
        delivered
    }

    /// Live subscriber count (closed ones may linger until the next emit).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().iter().filter(|s| !s.tx.is_closed()).count()
    }

    /// Total events emitted.
    #[must_use]
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
