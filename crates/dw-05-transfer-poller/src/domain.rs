//! # Poller Domain
//!
//! Errors, settings, and the pure part of a tick: turning the transactions
//! found on watched addresses into per-address incoming observations.

use chrono::{DateTime, Utc};
use dw_01_time_source::ClockError;
use dw_02_quorum_client::QuorumError;
use dw_03_account_store::{AccountState, StoreError};
use shared_types::{tails_of, value_to, Address, BundleHash, ErrorKind, TaskError, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a poll tick.
#[derive(Debug, Clone, Error)]
pub enum PollError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Quorum(#[from] QuorumError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PollError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PollError::Clock(e) => e.kind(),
            PollError::Quorum(e) => e.kind(),
            PollError::Store(e) => e.kind(),
        }
    }

    /// Whether the tick failed because too few nodes answered.
    pub fn is_quorum_unavailable(&self) -> bool {
        matches!(self, PollError::Quorum(QuorumError::Unavailable { .. }))
    }
}

impl From<PollError> for TaskError {
    fn from(err: PollError) -> Self {
        // Disagreement is reported under its own kind so operators see it.
        let kind = match err.kind() {
            ErrorKind::QuorumDisagreement => ErrorKind::QuorumDisagreement,
            _ => ErrorKind::PollFailure,
        };
        TaskError::new(kind, "transfer poll failed").with_cause(err)
    }
}

/// Poller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// `T_poll`.
    pub interval: Duration,
    /// Consecutive `QuorumUnavailable` ticks before `QuorumDown` is reported.
    pub quorum_down_after_ticks: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            quorum_down_after_ticks: 3,
        }
    }
}

/// One incoming bundle as seen from one deposit address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub address: Address,
    pub bundle: BundleHash,
    /// Net value the bundle moves into `address`.
    pub value: u64,
    /// Tail transactions of every attachment found.
    pub tails: Vec<Transaction>,
}

impl Incoming {
    pub fn is_message(&self) -> bool {
        self.value == 0
    }
}

/// Addresses the poller has to query at `now`.
pub fn watched_addresses(state: &AccountState, now: DateTime<Utc>) -> Vec<Address> {
    state
        .deposits
        .values()
        .filter(|record| record.is_watched(now))
        .map(|record| record.address().clone())
        .collect()
}

/// Group `txs` by bundle and pick out what each watched address receives.
///
/// Bundles the account sent, or that spend from one of its own addresses,
/// are outgoing (including their change) and are not deposits. The input of
/// an own bundle is usually no longer watched, so `txs` alone cannot tell.
pub fn incoming_bundles(
    state: &AccountState,
    watched: &[Address],
    txs: &[Transaction],
) -> Vec<Incoming> {
    let mut by_bundle: BTreeMap<&BundleHash, Vec<Transaction>> = BTreeMap::new();
    for tx in txs {
        by_bundle.entry(&tx.bundle).or_default().push(tx.clone());
    }

    let own = |address: &Address| {
        state.deposits.contains_key(address) || state.spent_addresses.contains(address)
    };

    let mut incoming = Vec::new();
    for (bundle, txs) in by_bundle {
        if state.is_sent(bundle) || txs.iter().any(|tx| tx.value < 0 && own(&tx.address)) {
            continue;
        }
        let tails = tails_of(&txs);
        let tails = if tails.is_empty() { txs.clone() } else { tails };

        let touched: BTreeSet<&Address> = txs.iter().map(|tx| &tx.address).collect();
        for address in watched.iter().filter(|a| touched.contains(a)) {
            let value = value_to(&txs, address);
            if value < 0 {
                continue;
            }
            incoming.push(Incoming {
                address: address.clone(),
                bundle: bundle.clone(),
                value: value as u64,
                tails: tails.clone(),
            });
        }
    }
    incoming
}
