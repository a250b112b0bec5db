//! Crypto error types.

use thiserror::Error;

/// Ledger primitive errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Seed is empty, too long, or contains non-tryte characters.
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// A bundle must contain at least one transaction.
    #[error("Empty bundle")]
    EmptyBundle,

    /// Bundle transactions are not indexed `0..=last_index`.
    #[error("Malformed bundle: {0}")]
    MalformedBundle(String),
}
