//! # Transfer Poller Service
//!
//! One tick:
//!
//! 1. Read the account state and the authoritative time.
//! 2. Fetch every transaction touching a watched deposit address.
//! 3. First sighting of `(address, bundle)` → `ReceivingDeposit`, or
//!    `ReceivedMessage` for zero value.
//! 4. Observed but unconfirmed bundles that are now included →
//!    `ReceivedDeposit` (value bundles only).
//! 5. Pending outgoing bundles with an included attachment → `Confirmed`,
//!    then removed from pending.
//! 6. Deposit records that were spent, are no longer watched, back no
//!    pending bundle and hold nothing on the ledger are pruned.
//!
//! Exactly-once emission rests on the store: an event is published only by
//! the call whose `record_incoming*` / `mark_confirmed` made the transition.
//! Those marks are never undone, so a clock that jumps backwards can make an
//! address watched again but never re-emits or retracts an event.

use crate::domain::{incoming_bundles, watched_addresses, Incoming, PollError, PollerConfig};
use async_trait::async_trait;
use dw_01_time_source::Clock;
use dw_02_quorum_client::LedgerApi;
use dw_03_account_store::{AccountState, AccountStore, StoreError};
use dw_telemetry::{metric_inc, BUNDLES_CONFIRMED, DEPOSITS_RECEIVED};
use shared_bus::{AccountEvent, EventPublisher};
use shared_types::{tails_of, Address, BackgroundTask, ErrorKind, TaskError, TxHash};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub watched: usize,
    pub receiving: usize,
    pub received: usize,
    pub messages: usize,
    pub confirmed: usize,
    pub pruned: usize,
}

/// The transfer poller.
pub struct TransferPoller {
    seed_hash: String,
    ledger: Arc<dyn LedgerApi>,
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventPublisher>,
    config: PollerConfig,
    unavailable_ticks: AtomicU32,
    quorum_down: AtomicBool,
}

impl TransferPoller {
    pub fn new(
        seed_hash: impl Into<String>,
        ledger: Arc<dyn LedgerApi>,
        store: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventPublisher>,
        config: PollerConfig,
    ) -> Self {
        Self {
            seed_hash: seed_hash.into(),
            ledger,
            store,
            clock,
            events,
            config,
            unavailable_ticks: AtomicU32::new(0),
            quorum_down: AtomicBool::new(false),
        }
    }

    /// Run one tick and return what it did.
    pub async fn poll_once(&self) -> Result<PollReport, PollError> {
        let now = self.clock.now().await?;
        let state = self.store.load(&self.seed_hash)?;
        let mut report = PollReport::default();

        // Outgoing work still runs when the incoming half fails.
        let incoming = self.poll_incoming(&state, now, &mut report).await;
        let outgoing = self.poll_outgoing(&state, &mut report).await;
        incoming.and(outgoing)?;
        self.prune_settled(&state, now, &mut report).await?;

        debug!(?report, "[dw-05] Poll tick complete");
        Ok(report)
    }

    async fn poll_incoming(
        &self,
        state: &AccountState,
        now: chrono::DateTime<chrono::Utc>,
        report: &mut PollReport,
    ) -> Result<(), PollError> {
        let watched = watched_addresses(state, now);
        report.watched = watched.len();
        if watched.is_empty() {
            return Ok(());
        }

        let txs = self.ledger.find_transactions(&watched).await?;
        let incoming = incoming_bundles(state, &watched, &txs);

        let mut unconfirmed: Vec<&Incoming> = Vec::new();
        for item in &incoming {
            let Some(record) = state.deposits.get(&item.address) else {
                continue;
            };
            if !record.observed_incoming_bundles.contains(&item.bundle)
                && self
                    .store
                    .record_incoming(&self.seed_hash, &item.address, &item.bundle)?
            {
                self.announce_incoming(item, report);
            }
            if !record.confirmed_incoming_bundles.contains(&item.bundle) {
                unconfirmed.push(item);
            }
        }
        if unconfirmed.is_empty() {
            return Ok(());
        }

        let references: Vec<TxHash> = unconfirmed
            .iter()
            .flat_map(|item| item.tails.iter().map(|tx| tx.hash.clone()))
            .collect();
        let states = self.ledger.get_inclusion_states(&references).await?;

        let mut offset = 0;
        for item in unconfirmed {
            let included = states
                .iter()
                .skip(offset)
                .take(item.tails.len())
                .any(|included| *included);
            offset += item.tails.len();
            if !included {
                continue;
            }
            let first = self.store.record_incoming_confirmed(
                &self.seed_hash,
                &item.address,
                &item.bundle,
            )?;
            // Confirmed messages settle silently.
            if first && !item.is_message() {
                info!(
                    address = %item.address.short(),
                    bundle = %item.bundle.short(),
                    value = item.value,
                    "[dw-05] Deposit confirmed"
                );
                metric_inc!(DEPOSITS_RECEIVED);
                self.events.publish(AccountEvent::ReceivedDeposit {
                    tails: item.tails.clone(),
                });
                report.received += 1;
            }
        }
        Ok(())
    }

    fn announce_incoming(&self, item: &Incoming, report: &mut PollReport) {
        let tails = item.tails.clone();
        if item.is_message() {
            info!(address = %item.address.short(), bundle = %item.bundle.short(), "[dw-05] Message received");
            self.events.publish(AccountEvent::ReceivedMessage { tails });
            report.messages += 1;
        } else {
            info!(
                address = %item.address.short(),
                bundle = %item.bundle.short(),
                value = item.value,
                "[dw-05] Incoming deposit seen"
            );
            self.events.publish(AccountEvent::ReceivingDeposit { tails });
            report.receiving += 1;
        }
    }

    async fn poll_outgoing(
        &self,
        state: &AccountState,
        report: &mut PollReport,
    ) -> Result<(), PollError> {
        let mut open = Vec::new();
        for bundle in state.pending.values() {
            if bundle.confirmed {
                // Confirmed (and announced) by the promoter; only cleanup left.
                self.store.remove_pending(&self.seed_hash, &bundle.bundle_hash)?;
            } else {
                open.push((bundle, bundle.attachment_tails()));
            }
        }
        if open.is_empty() {
            return Ok(());
        }

        let references: Vec<TxHash> = open.iter().flat_map(|(_, tails)| tails.clone()).collect();
        let states = self.ledger.get_inclusion_states(&references).await?;

        let mut offset = 0;
        for (bundle, tails) in open {
            let included = states
                .iter()
                .skip(offset)
                .take(tails.len())
                .any(|included| *included);
            offset += tails.len();
            if !included {
                continue;
            }

            match self.store.mark_confirmed(&self.seed_hash, &bundle.bundle_hash) {
                Ok(true) => {
                    info!(bundle = %bundle.bundle_hash.short(), "[dw-05] Outgoing bundle confirmed");
                    metric_inc!(BUNDLES_CONFIRMED);
                    self.events.publish(AccountEvent::Confirmed {
                        tails: tails_of(&bundle.transactions),
                    });
                    report.confirmed += 1;
                }
                Ok(false) => {}
                // Removed concurrently (abandoned); nothing to settle.
                Err(StoreError::UnknownBundle(_)) => continue,
                Err(e) => return Err(e.into()),
            }
            self.store.remove_pending(&self.seed_hash, &bundle.bundle_hash)?;
        }
        Ok(())
    }

    async fn prune_settled(
        &self,
        state: &AccountState,
        now: chrono::DateTime<chrono::Utc>,
        report: &mut PollReport,
    ) -> Result<(), PollError> {
        let backing: BTreeSet<Address> =
            state.pending.values().flat_map(|bundle| bundle.inputs()).collect();
        let candidates: Vec<Address> = state
            .deposits
            .values()
            .filter(|record| {
                state.is_spent(record.address())
                    && !record.is_watched(now)
                    && !backing.contains(record.address())
            })
            .map(|record| record.address().clone())
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let balances = self.ledger.get_balances(&candidates).await?;
        for (address, balance) in candidates.iter().zip(balances) {
            if balance == 0 && self.store.remove_deposit(&self.seed_hash, address)? {
                debug!(address = %address.short(), "[dw-05] Settled deposit record pruned");
                report.pruned += 1;
            }
        }
        Ok(())
    }

    /// Count consecutive `QuorumUnavailable` ticks and report an outage once.
    fn track_quorum(&self, result: &Result<PollReport, PollError>) {
        match result {
            Err(e) if e.is_quorum_unavailable() => {
                let ticks = self.unavailable_ticks.fetch_add(1, Ordering::AcqRel) + 1;
                if ticks >= self.config.quorum_down_after_ticks
                    && !self.quorum_down.swap(true, Ordering::AcqRel)
                {
                    warn!(ticks, "[dw-05] Quorum down");
                    self.events.publish(AccountEvent::internal(
                        ErrorKind::QuorumDown,
                        format!("quorum unavailable for {ticks} consecutive ticks"),
                    ));
                }
            }
            Err(_) => {}
            Ok(_) => {
                self.unavailable_ticks.store(0, Ordering::Release);
                if self.quorum_down.swap(false, Ordering::AcqRel) {
                    info!("[dw-05] Quorum recovered");
                }
            }
        }
    }
}

#[async_trait]
impl BackgroundTask for TransferPoller {
    fn name(&self) -> &'static str {
        "transfer-poller"
    }

    fn interval(&self) -> Duration {
        self.config.interval
    }

    async fn tick(&self) -> Result<(), TaskError> {
        let result = self.poll_once().await;
        self.track_quorum(&result);
        result.map(|_| ()).map_err(TaskError::from)
    }
}
