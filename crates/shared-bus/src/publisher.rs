//! # Event Publisher
//!
//! Defines the publishing side of the event bus.
//!
//! Every listener owns one bounded channel per kind it registered for.
//! Publication uses `try_send` only, so a stalled listener costs the
//! publisher nothing: the event is dropped for that listener and an
//! `InternalError(EventDropped)` is published in its place. Drops of
//! `InternalError` events themselves are counted but not reported.

use crate::events::{AccountEvent, EventFilter, EventKind, InternalError};
use crate::subscriber::{Listener, ListenerId, Sequenced, SubscriptionError};
use crate::DEFAULT_CHANNEL_CAPACITY;
use dw_telemetry::{metric_inc, EVENTS_DROPPED, EVENTS_PUBLISHED};
use parking_lot::Mutex;
use shared_types::ErrorKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Trait for publishing events to the bus.
///
/// Background loops hold an `Arc<dyn EventPublisher>` so tests can observe
/// what they emit.
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the bus. Never blocks.
    ///
    /// # Returns
    ///
    /// The number of listeners that received the event.
    fn publish(&self, event: AccountEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// Channels the bus holds for one listener.
pub(crate) struct ListenerSlots {
    channels: HashMap<EventKind, mpsc::Sender<Sequenced>>,
    shutdown: mpsc::Sender<AccountEvent>,
}

pub(crate) struct BusInner {
    /// Disjoint from any account lock; never held across an await.
    registry: Mutex<HashMap<ListenerId, ListenerSlots>>,
    next_listener: AtomicU64,
    /// Bus-wide publication order, assigned under the registry lock.
    sequence: AtomicU64,
    events_published: AtomicU64,
    events_dropped: AtomicU64,
    closed: AtomicBool,
    capacity: usize,
}

impl BusInner {
    pub(crate) fn unregister(&self, id: ListenerId) {
        if self.registry.lock().remove(&id).is_some() {
            debug!(listener = %id, "Listener unregistered");
        }
    }
}

/// In-memory event bus. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus whose listener channels hold `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(1),
                sequence: AtomicU64::new(0),
                events_published: AtomicU64::new(0),
                events_dropped: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register a listener with the bus-wide channel capacity.
    pub fn subscribe(&self, filter: EventFilter) -> Result<Listener, SubscriptionError> {
        self.subscribe_with_capacity(filter, self.inner.capacity)
    }

    /// Register a listener with its own per-kind channel capacity.
    pub fn subscribe_with_capacity(
        &self,
        filter: EventFilter,
        capacity: usize,
    ) -> Result<Listener, SubscriptionError> {
        let mut registry = self.inner.registry.lock();
        // Checked under the lock so a concurrent close() cannot miss us.
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(SubscriptionError::Closed);
        }

        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        let kinds = filter.resolve();
        let mut channels = HashMap::with_capacity(kinds.len());
        let mut receivers = Vec::with_capacity(kinds.len());
        for kind in &kinds {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            channels.insert(*kind, tx);
            receivers.push((*kind, rx));
        }
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        registry.insert(
            id,
            ListenerSlots {
                channels,
                shutdown: shutdown_tx,
            },
        );
        drop(registry);

        debug!(listener = %id, kinds = ?kinds, "Listener registered");
        Ok(Listener::new(
            id,
            receivers,
            shutdown_rx,
            Arc::downgrade(&self.inner),
        ))
    }

    /// Close the bus: every listener receives `Shutdown` after draining what
    /// is already buffered, and later publications are discarded.
    ///
    /// Idempotent.
    pub fn close(&self) {
        let listeners = {
            let mut registry = self.inner.registry.lock();
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *registry)
        };
        let count = listeners.len();
        for (_, slots) in listeners {
            let ListenerSlots { channels, shutdown } = slots;
            // Per-kind senders go first so the listener sees their end before
            // it can act on Shutdown.
            drop(channels);
            let _ = shutdown.try_send(AccountEvent::Shutdown);
        }
        debug!(listeners = count, "Event bus closed");
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Total events dropped because a listener channel was full.
    #[must_use]
    pub fn events_dropped(&self) -> u64 {
        self.inner.events_dropped.load(Ordering::Relaxed)
    }

    /// Default per-kind channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: AccountEvent) -> usize {
        let kind = event.kind();
        if kind == EventKind::Shutdown {
            warn!("Shutdown is delivered by close(), not publish()");
            return 0;
        }
        if self.inner.closed.load(Ordering::Acquire) {
            debug!(kind = %kind, "Event discarded (bus closed)");
            return 0;
        }

        self.inner.events_published.fetch_add(1, Ordering::Relaxed);
        metric_inc!(EVENTS_PUBLISHED, &[kind.as_str()]);

        let mut delivered = 0;
        let mut dropped_for = Vec::new();
        {
            let registry = self.inner.registry.lock();
            let seq = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
            for (id, slots) in registry.iter() {
                let Some(channel) = slots.channels.get(&kind) else {
                    continue;
                };
                match channel.try_send((seq, event.clone())) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.inner.events_dropped.fetch_add(1, Ordering::Relaxed);
                        metric_inc!(EVENTS_DROPPED, &[kind.as_str()]);
                        dropped_for.push(*id);
                    }
                    // Receiver dropped; Listener::drop unregisters it.
                    Err(mpsc::error::TrySendError::Closed(_)) => {}
                }
            }
        }

        // Reported outside the registry lock; InternalError drops stay silent.
        if kind != EventKind::InternalError {
            for id in dropped_for {
                warn!(listener = %id, kind = %kind, "Listener channel full, event dropped");
                self.publish(AccountEvent::InternalError(
                    InternalError::new(
                        ErrorKind::EventDropped,
                        format!("{kind} event dropped for listener {id}"),
                    )
                    .with_cause(format!("variant={kind} listener_id={id}")),
                ));
            }
        }

        delivered
    }

    fn events_published(&self) -> u64 {
        self.inner.events_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tokio::time::timeout;

    fn message() -> AccountEvent {
        AccountEvent::ReceivedMessage { tails: vec![] }
    }

    #[test]
    fn test_publish_no_listeners() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(message()), 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_reaches_only_interested_listeners() {
        let bus = EventBus::new();
        let _all = bus.subscribe(EventFilter::all()).unwrap();
        let _messages = bus
            .subscribe(EventFilter::kinds(vec![EventKind::ReceivedMessage]))
            .unwrap();
        let _confirmed = bus
            .subscribe(EventFilter::kinds(vec![EventKind::Confirmed]))
            .unwrap();

        assert_eq!(bus.publish(message()), 2);
        assert_eq!(bus.listener_count(), 3);
    }

    #[tokio::test]
    async fn test_full_channel_drops_and_reports() {
        let bus = EventBus::new();
        let _slow = bus
            .subscribe_with_capacity(EventFilter::kinds(vec![EventKind::ReceivedMessage]), 1)
            .unwrap();
        let mut observer = bus
            .subscribe_with_capacity(EventFilter::kinds(vec![EventKind::InternalError]), 16)
            .unwrap();

        bus.publish(message());
        bus.publish(message());

        let event = timeout(Duration::from_millis(100), observer.recv())
            .await
            .expect("timeout")
            .expect("event");
        match event {
            AccountEvent::InternalError(err) => assert_eq!(err.kind, ErrorKind::EventDropped),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(bus.events_dropped(), 1);
    }

    #[tokio::test]
    async fn test_internal_error_drops_are_silent() {
        let bus = EventBus::new();
        let _slow = bus
            .subscribe_with_capacity(EventFilter::kinds(vec![EventKind::InternalError]), 1)
            .unwrap();

        for _ in 0..10 {
            bus.publish(AccountEvent::internal(ErrorKind::PollFailure, "boom"));
        }
        assert_eq!(bus.events_dropped(), 9);
        // Ten publications, no EventDropped reports on top.
        assert_eq!(bus.events_published(), 10);
    }

    #[tokio::test]
    async fn test_publisher_never_blocks_on_stalled_listener() {
        let bus = EventBus::new();
        let _stalled = bus
            .subscribe_with_capacity(EventFilter::kinds(vec![EventKind::ReceivedMessage]), 1)
            .unwrap();

        let start = Instant::now();
        for _ in 0..1000 {
            bus.publish(message());
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(bus.events_dropped(), 999);
    }

    #[test]
    fn test_subscribe_after_close_fails() {
        let bus = EventBus::new();
        bus.close();
        bus.close();
        assert!(bus.is_closed());
        assert_eq!(
            bus.subscribe(EventFilter::all()).err(),
            Some(SubscriptionError::Closed)
        );
        assert_eq!(bus.publish(message()), 0);
    }
}
