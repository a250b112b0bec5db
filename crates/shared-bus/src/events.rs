//! # Account Events
//!
//! Lifecycle events emitted by the account and its background loops.

use serde::{Deserialize, Serialize};
use shared_types::{BundleHash, ErrorKind, Transaction, TxHash};
use std::fmt;

/// Payload of an `InternalError` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalError {
    pub kind: ErrorKind,
    pub message: String,
    pub cause: Option<String>,
}

impl InternalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

impl From<shared_types::TaskError> for InternalError {
    fn from(err: shared_types::TaskError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
            cause: err.cause,
        }
    }
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEvent {
    // =========================================================================
    // OUTGOING
    // =========================================================================
    /// A zero-value promotion referencing a pending tail was published.
    Promotion {
        bundle_hash: BundleHash,
        promotion_tail_tx_hash: TxHash,
    },

    /// A pending bundle was republished with fresh tips.
    Reattachment {
        bundle_hash: BundleHash,
        reattachment_tail_tx_hash: TxHash,
    },

    /// An outgoing bundle was just published.
    Sending { tails: Vec<Transaction> },

    /// An outgoing bundle settled.
    Confirmed { tails: Vec<Transaction> },

    // =========================================================================
    // INCOMING
    // =========================================================================
    /// An incoming value bundle was seen on the ledger, not yet confirmed.
    ReceivingDeposit { tails: Vec<Transaction> },

    /// An incoming value bundle was confirmed.
    ReceivedDeposit { tails: Vec<Transaction> },

    /// An incoming zero-value bundle was seen.
    ReceivedMessage { tails: Vec<Transaction> },

    // =========================================================================
    // CONTROL
    // =========================================================================
    /// Failure inside a background loop or the bus itself.
    InternalError(InternalError),

    /// The account shut down. Always the last event a listener receives.
    Shutdown,
}

impl AccountEvent {
    /// Get the kind for this event (for filtering).
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Promotion { .. } => EventKind::Promotion,
            Self::Reattachment { .. } => EventKind::Reattachment,
            Self::Sending { .. } => EventKind::Sending,
            Self::Confirmed { .. } => EventKind::Confirmed,
            Self::ReceivingDeposit { .. } => EventKind::ReceivingDeposit,
            Self::ReceivedDeposit { .. } => EventKind::ReceivedDeposit,
            Self::ReceivedMessage { .. } => EventKind::ReceivedMessage,
            Self::InternalError(_) => EventKind::InternalError,
            Self::Shutdown => EventKind::Shutdown,
        }
    }

    /// Bundle the event is about, if any.
    #[must_use]
    pub fn bundle_hash(&self) -> Option<&BundleHash> {
        match self {
            Self::Promotion { bundle_hash, .. } | Self::Reattachment { bundle_hash, .. } => {
                Some(bundle_hash)
            }
            Self::Sending { tails }
            | Self::Confirmed { tails }
            | Self::ReceivingDeposit { tails }
            | Self::ReceivedDeposit { tails }
            | Self::ReceivedMessage { tails } => tails.first().map(|tx| &tx.bundle),
            Self::InternalError(_) | Self::Shutdown => None,
        }
    }

    /// Shorthand for an `InternalError` event.
    pub fn internal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::InternalError(InternalError::new(kind, message))
    }
}

/// Event kinds for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Promotion,
    Reattachment,
    Sending,
    Confirmed,
    ReceivingDeposit,
    ReceivedDeposit,
    ReceivedMessage,
    InternalError,
    Shutdown,
}

impl EventKind {
    /// Every kind a listener can register for. `Shutdown` is implicit.
    pub const SUBSCRIBABLE: [EventKind; 8] = [
        EventKind::Promotion,
        EventKind::Reattachment,
        EventKind::Sending,
        EventKind::Confirmed,
        EventKind::ReceivingDeposit,
        EventKind::ReceivedDeposit,
        EventKind::ReceivedMessage,
        EventKind::InternalError,
    ];

    /// Name used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Promotion => "Promotion",
            Self::Reattachment => "Reattachment",
            Self::Sending => "Sending",
            Self::Confirmed => "Confirmed",
            Self::ReceivingDeposit => "ReceivingDeposit",
            Self::ReceivedDeposit => "ReceivedDeposit",
            Self::ReceivedMessage => "ReceivedMessage",
            Self::InternalError => "InternalError",
            Self::Shutdown => "Shutdown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interest set for a listener.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Kinds to include. Empty means all kinds.
    pub kinds: Vec<EventKind>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific kinds.
    #[must_use]
    pub fn kinds(kinds: Vec<EventKind>) -> Self {
        Self { kinds }
    }

    /// The kinds this filter opens a channel for, deduplicated.
    #[must_use]
    pub fn resolve(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = if self.kinds.is_empty() {
            EventKind::SUBSCRIBABLE.to_vec()
        } else {
            self.kinds
                .iter()
                .copied()
                .filter(|k| *k != EventKind::Shutdown)
                .collect()
        };
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &AccountEvent) -> bool {
        event.kind() == EventKind::Shutdown || self.resolve().contains(&event.kind())
    }
}
