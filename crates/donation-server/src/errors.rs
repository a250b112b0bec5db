use dw_04_deposit_conditions::ConditionsError;
use dw_07_account::AccountError;
use shared_types::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Server-side failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Account(#[from] AccountError),

    /// The `current` record exists but cannot be decoded.
    #[error("current donation link record: {0}")]
    Record(#[from] ConditionsError),

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Account(e) => e.kind(),
            Self::Record(e) => e.kind(),
            Self::Io { .. } => ErrorKind::StoreUnavailable,
        }
    }
}
