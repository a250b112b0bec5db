//! Store errors.

use shared_types::{Address, BundleHash, ErrorKind};
use thiserror::Error;

/// Errors from a key-value backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },

    /// Another process holds the data directory.
    #[error("data directory locked: {message}")]
    Locked { message: String },
}

/// Errors from account store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No state saved for this seed.
    #[error("no account state for seed hash {0}")]
    NotFound(String),

    #[error("unknown pending bundle {0}")]
    UnknownBundle(BundleHash),

    #[error("unknown deposit address {0}")]
    UnknownAddress(Address),

    /// A saved state could not be decoded.
    #[error("corrupt account state: {0}")]
    Corrupt(String),

    /// The backend failed or the store was closed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::StoreUnavailable
    }
}

impl From<KVStoreError> for StoreError {
    fn from(err: KVStoreError) -> Self {
        match err {
            KVStoreError::CorruptionError { message } => StoreError::Corrupt(message),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}
