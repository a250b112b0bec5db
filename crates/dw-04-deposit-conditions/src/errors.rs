//! Deposit-condition errors.

use shared_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionsError {
    /// A magnet link did not match the grammar.
    #[error("invalid magnet link: {0}")]
    InvalidMagnet(String),

    /// Conditions violate the use-policy invariants.
    #[error("invalid deposit conditions: {0}")]
    InvalidConditions(String),

    /// An opaque record could not be decoded.
    #[error("corrupt conditions record: {0}")]
    CorruptRecord(String),
}

impl ConditionsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMagnet(_) => ErrorKind::InvalidMagnet,
            Self::InvalidConditions(_) | Self::CorruptRecord(_) => ErrorKind::InvalidConditions,
        }
    }
}
