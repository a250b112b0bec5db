//! # Listener
//!
//! The receiving side of the event bus.

use crate::events::{AccountEvent, EventKind};
use crate::publisher::BusInner;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Weak;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// An event stamped with its bus-wide publication number.
pub(crate) type Sequenced = (u64, AccountEvent);

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    /// Shutdown was signalled; drain what is buffered, then yield it.
    Draining,
    Finished,
}

/// A registered listener.
///
/// Holds one in-order channel per kind. On receive the heads of all ready
/// channels are compared by publication number, so events come out in the
/// order they were published (a `Sending` is never overtaken by the
/// `Confirmed` of the same bundle) and `Shutdown` is always last. Dropping
/// the listener unregisters it.
pub struct Listener {
    id: ListenerId,
    streams: StreamMap<EventKind, ReceiverStream<Sequenced>>,
    /// At most one buffered event per kind, taken off its channel early.
    heads: HashMap<EventKind, Sequenced>,
    shutdown: mpsc::Receiver<AccountEvent>,
    bus: Weak<BusInner>,
    phase: Phase,
}

impl Listener {
    pub(crate) fn new(
        id: ListenerId,
        receivers: Vec<(EventKind, mpsc::Receiver<Sequenced>)>,
        shutdown: mpsc::Receiver<AccountEvent>,
        bus: Weak<BusInner>,
    ) -> Self {
        let mut streams = StreamMap::with_capacity(receivers.len());
        for (kind, rx) in receivers {
            streams.insert(kind, ReceiverStream::new(rx));
        }
        Self {
            id,
            streams,
            heads: HashMap::new(),
            shutdown,
            bus,
            phase: Phase::Open,
        }
    }

    /// This listener's identifier.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Kinds this listener registered for.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = self.streams.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Receive the next event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next event; `Shutdown` is the last one
    /// - `None` - `Shutdown` was already returned
    pub async fn recv(&mut self) -> Option<AccountEvent> {
        loop {
            self.fill_heads();
            if let Some(event) = self.pop_earliest() {
                return Some(event);
            }
            match self.phase {
                Phase::Finished => return None,
                Phase::Draining => match self.streams.next().await {
                    Some((kind, head)) => {
                        self.heads.insert(kind, head);
                    }
                    None => {
                        self.phase = Phase::Finished;
                        return Some(AccountEvent::Shutdown);
                    }
                },
                Phase::Open => {
                    tokio::select! {
                        biased;
                        Some((kind, head)) = self.streams.next() => {
                            self.heads.insert(kind, head);
                        }
                        // A closed shutdown channel means the bus went away
                        // without close(); treat it the same.
                        _ = self.shutdown.recv() => {
                            debug!(listener = %self.id, "Shutdown signalled");
                            self.phase = Phase::Draining;
                        }
                    }
                }
            }
        }
    }

    /// Pull the next event of every kind that has none buffered yet.
    fn fill_heads(&mut self) {
        for (kind, stream) in self.streams.iter_mut() {
            if self.heads.contains_key(kind) {
                continue;
            }
            if let Ok(head) = stream.as_mut().try_recv() {
                self.heads.insert(*kind, head);
            }
        }
    }

    fn pop_earliest(&mut self) -> Option<AccountEvent> {
        let kind = self
            .heads
            .iter()
            .min_by_key(|(_, (seq, _))| *seq)
            .map(|(kind, _)| *kind)?;
        self.heads.remove(&kind).map(|(_, event)| event)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unregister(self.id);
        }
    }
}
