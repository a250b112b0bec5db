//! # Promoter Domain

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dw_01_time_source::ClockError;
use dw_02_quorum_client::QuorumError;
use dw_03_account_store::{PendingBundle, StoreError};
use shared_crypto::CryptoError;
use shared_types::{ErrorKind, TaskError, TxHash};
use std::time::Duration;
use thiserror::Error;

/// Tag carried by promotion transactions.
pub const PROMOTION_TAG: &str = "DONATIONWALLETPROMOTE";

/// Errors from promoting or reattaching one bundle.
#[derive(Debug, Clone, Error)]
pub enum PromoteError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Quorum(#[from] QuorumError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot build promotion: {0}")]
    Crypto(#[from] CryptoError),
}

impl PromoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PromoteError::Clock(e) => e.kind(),
            PromoteError::Quorum(e) => e.kind(),
            PromoteError::Store(e) => e.kind(),
            PromoteError::Crypto(_) => ErrorKind::LedgerFailure,
        }
    }
}

impl From<PromoteError> for TaskError {
    fn from(err: PromoteError) -> Self {
        let kind = match err.kind() {
            ErrorKind::QuorumDisagreement => ErrorKind::QuorumDisagreement,
            _ => ErrorKind::PollFailure,
        };
        TaskError::new(kind, "promote/reattach failed").with_cause(err)
    }
}

/// Promoter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoterConfig {
    /// `T_pr`; also the minimum age of a bundle's latest tail before it is
    /// touched again.
    pub interval: Duration,
    /// Depth for tip selection.
    pub depth: u64,
    /// Minimum weight magnitude for attachment.
    pub mwm: u64,
    /// Pending bundles older than this are abandoned.
    pub abandon_after: Duration,
}

impl Default for PromoterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            depth: 3,
            mwm: 14,
            abandon_after: Duration::from_secs(24 * 3600),
        }
    }
}

/// What to do with one pending bundle on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Touched too recently.
    Wait,
    /// Older than the abandonment horizon.
    Abandon,
    /// Check confirmation, then promote or reattach.
    Work { latest_attachment: TxHash },
}

impl PromoterConfig {
    /// Decide what a tick at `now` does with `bundle`.
    pub fn plan(&self, bundle: &PendingBundle, now: DateTime<Utc>) -> Plan {
        let age = now.signed_duration_since(bundle.created_at);
        if age > to_chrono(self.abandon_after) {
            return Plan::Abandon;
        }
        let idle = now.signed_duration_since(bundle.last_activity());
        if idle < to_chrono(self.interval) {
            return Plan::Wait;
        }
        match bundle.latest_attachment() {
            Some(tail) => Plan::Work {
                latest_attachment: tail.clone(),
            },
            // Nothing left to reference; only abandonment can clear it.
            None => Plan::Wait,
        }
    }
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}
