//! Account errors.

use dw_01_time_source::ClockError;
use dw_02_quorum_client::QuorumError;
use dw_03_account_store::StoreError;
use dw_04_deposit_conditions::ConditionsError;
use shared_bus::SubscriptionError;
use shared_crypto::CryptoError;
use shared_types::ErrorKind;
use thiserror::Error;

/// Errors returned by account operations.
///
/// These go to the caller only; an operation that fails never also
/// publishes an `InternalError` for the same failure.
#[derive(Debug, Clone, Error)]
pub enum AccountError {
    #[error("account is not running")]
    NotRunning,

    #[error("account already started")]
    AlreadyStarted,

    #[error("insufficient balance: {available} available, {required} required")]
    InsufficientBalance { available: u64, required: u64 },

    #[error("send refused: {reason}")]
    OracleRefused { reason: String },

    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error(transparent)]
    Conditions(#[from] ConditionsError),

    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Quorum(#[from] QuorumError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("ledger primitive failed: {0}")]
    Crypto(#[from] CryptoError),
}

impl AccountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotRunning => ErrorKind::NotRunning,
            Self::AlreadyStarted => ErrorKind::AlreadyStarted,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::OracleRefused { .. } => ErrorKind::OracleRefused,
            Self::InvalidTransfer(_) => ErrorKind::InvalidConditions,
            Self::Conditions(e) => e.kind(),
            Self::Clock(e) => e.kind(),
            Self::Quorum(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Crypto(_) => ErrorKind::LedgerFailure,
        }
    }
}

impl From<SubscriptionError> for AccountError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::Closed => Self::NotRunning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AccountError::NotRunning.kind(), ErrorKind::NotRunning);
        assert_eq!(
            AccountError::InsufficientBalance {
                available: 50,
                required: 100
            }
            .kind(),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(
            AccountError::from(QuorumError::Disagreement {
                largest: 2,
                responded: 5
            })
            .kind(),
            ErrorKind::QuorumDisagreement
        );
        assert_eq!(
            AccountError::from(ConditionsError::InvalidMagnet("x".into())).kind(),
            ErrorKind::InvalidMagnet
        );
        assert_eq!(
            AccountError::from(SubscriptionError::Closed).kind(),
            ErrorKind::NotRunning
        );
    }
}
