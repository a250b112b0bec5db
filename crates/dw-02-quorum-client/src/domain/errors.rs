//! Quorum client errors.

use shared_types::ErrorKind;
use thiserror::Error;

/// Errors raised by ledger calls.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuorumError {
    /// Too many nodes failed to answer or were stale.
    #[error("quorum unavailable: {responded}/{total} nodes usable")]
    Unavailable { responded: usize, total: usize },

    /// Nodes answered but no group reached the threshold.
    #[error("quorum disagreement: largest group {largest} of {responded}")]
    Disagreement { largest: usize, responded: usize },

    /// A single node could not be reached or timed out.
    #[error("node {node} failed: {reason}")]
    Node { node: String, reason: String },

    /// A node answered with an error body.
    #[error("node {node} rejected the request: {reason}")]
    Rejected { node: String, reason: String },

    /// The agreed response did not have the expected shape.
    #[error("invalid response to {command}: {reason}")]
    InvalidResponse { command: String, reason: String },

    /// Settings violate their bounds.
    #[error("invalid quorum settings: {0}")]
    InvalidSettings(String),
}

impl QuorumError {
    /// Category reported to the account and in events.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable { .. } | Self::InvalidSettings(_) => ErrorKind::QuorumUnavailable,
            Self::Disagreement { .. } => ErrorKind::QuorumDisagreement,
            Self::Node { .. } | Self::Rejected { .. } | Self::InvalidResponse { .. } => {
                ErrorKind::LedgerFailure
            }
        }
    }

    /// Whether a read may be retried after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
