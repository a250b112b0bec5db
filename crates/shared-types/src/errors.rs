//! # Error Kinds
//!
//! The failure categories the account engine distinguishes. Every crate keeps
//! its own `thiserror` enum and maps each variant to one of these kinds, so
//! background loops can report failures as `InternalError` events without
//! knowing the concrete error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categories of failure, stable across crates and over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No authoritative time could be obtained.
    ClockUnavailable,
    /// Time was served from a cached offset after a failed refresh.
    ClockDegraded,
    /// Too many quorum nodes failed to answer.
    QuorumUnavailable,
    /// Nodes answered but did not agree above the threshold.
    QuorumDisagreement,
    /// Quorum has been unavailable for several consecutive ticks.
    QuorumDown,
    /// The account store could not be read or written.
    StoreUnavailable,
    /// A magnet link failed to parse.
    InvalidMagnet,
    /// Not enough spendable funds.
    InsufficientBalance,
    /// A pending bundle outlived the abandonment horizon.
    BundleAbandoned,
    /// A poll tick failed.
    PollFailure,
    /// Ticks were skipped because the previous one was still running.
    PollOverrun,
    /// An event was dropped for a slow listener.
    EventDropped,
    /// The account is not running.
    NotRunning,
    /// The account was already started.
    AlreadyStarted,
    /// Deposit conditions violate their invariants.
    InvalidConditions,
    /// The send oracle refused a transfer.
    OracleRefused,
    /// A background loop panicked.
    BackgroundPanic,
    /// The ledger rejected or failed a write (tips, attach, broadcast).
    LedgerFailure,
}

impl ErrorKind {
    /// Name used in logs and wire payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClockUnavailable => "ClockUnavailable",
            Self::ClockDegraded => "ClockDegraded",
            Self::QuorumUnavailable => "QuorumUnavailable",
            Self::QuorumDisagreement => "QuorumDisagreement",
            Self::QuorumDown => "QuorumDown",
            Self::StoreUnavailable => "StoreUnavailable",
            Self::InvalidMagnet => "InvalidMagnet",
            Self::InsufficientBalance => "InsufficientBalance",
            Self::BundleAbandoned => "BundleAbandoned",
            Self::PollFailure => "PollFailure",
            Self::PollOverrun => "PollOverrun",
            Self::EventDropped => "EventDropped",
            Self::NotRunning => "NotRunning",
            Self::AlreadyStarted => "AlreadyStarted",
            Self::InvalidConditions => "InvalidConditions",
            Self::OracleRefused => "OracleRefused",
            Self::BackgroundPanic => "BackgroundPanic",
            Self::LedgerFailure => "LedgerFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
