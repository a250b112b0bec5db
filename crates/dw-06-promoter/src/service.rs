//! # Promoter Service
//!
//! For every pending bundle idle for at least one interval:
//!
//! 1. Any attachment tail included → `mark_confirmed`, `Confirmed`.
//! 2. Latest attachment still consistent → zero-value promotion approving
//!    it, `Promotion`.
//! 3. Otherwise → the stored signed transactions are attached again on
//!    fresh tips, `Reattachment`.
//!
//! A bundle gets at most one of these per tick. Bundles past the abandonment
//! horizon are dropped with `InternalError(BundleAbandoned)`; their inputs
//! stay spent. The promoter and the poller share no state beyond the store.

use crate::domain::{Plan, PromoteError, PromoterConfig, PROMOTION_TAG};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dw_01_time_source::Clock;
use dw_02_quorum_client::{LedgerApi, Tips};
use dw_03_account_store::{AccountStore, PendingBundle, PendingTail, StoreError, TailKind};
use dw_telemetry::{metric_inc, BUNDLES_CONFIRMED, BUNDLES_PROMOTED, BUNDLES_REATTACHED};
use shared_bus::{AccountEvent, EventPublisher, InternalError};
use shared_crypto::{BundleBuilder, OutputSpec};
use shared_types::{tails_of, Address, BackgroundTask, ErrorKind, TaskError, Transaction, TxHash};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of working one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Confirmed,
    Promoted(TxHash),
    Reattached(TxHash),
    /// Settled or removed by someone else meanwhile.
    Gone,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromoteReport {
    pub waiting: usize,
    pub confirmed: usize,
    pub promoted: usize,
    pub reattached: usize,
    pub abandoned: usize,
}

/// The promoter/reattacher.
pub struct Promoter {
    seed_hash: String,
    ledger: Arc<dyn LedgerApi>,
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventPublisher>,
    config: PromoterConfig,
}

impl Promoter {
    pub fn new(
        seed_hash: impl Into<String>,
        ledger: Arc<dyn LedgerApi>,
        store: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventPublisher>,
        config: PromoterConfig,
    ) -> Self {
        Self {
            seed_hash: seed_hash.into(),
            ledger,
            store,
            clock,
            events,
            config,
        }
    }

    /// Run one tick.
    ///
    /// A failing bundle does not stop the others; the first error is
    /// returned after every bundle had its turn.
    pub async fn promote_once(&self) -> Result<PromoteReport, PromoteError> {
        let now = self.clock.now().await?;
        let state = self.store.load(&self.seed_hash)?;
        let mut report = PromoteReport::default();
        let mut first_error = None;

        for bundle in state.pending.values().filter(|b| !b.confirmed) {
            let result = match self.config.plan(bundle, now) {
                Plan::Wait => {
                    report.waiting += 1;
                    continue;
                }
                Plan::Abandon => self.abandon(bundle).map(|removed| {
                    if removed {
                        report.abandoned += 1;
                    }
                }),
                Plan::Work { latest_attachment } => self
                    .work(bundle, &latest_attachment, now)
                    .await
                    .map(|outcome| match outcome {
                        Outcome::Confirmed => report.confirmed += 1,
                        Outcome::Promoted(_) => report.promoted += 1,
                        Outcome::Reattached(_) => report.reattached += 1,
                        Outcome::Gone => {}
                    }),
            };
            if let Err(e) = result {
                warn!(bundle = %bundle.bundle_hash.short(), error = %e, "[dw-06] Bundle skipped this tick");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                debug!(?report, "[dw-06] Promote tick complete");
                Ok(report)
            }
        }
    }

    fn abandon(&self, bundle: &PendingBundle) -> Result<bool, PromoteError> {
        let removed = self
            .store
            .remove_pending(&self.seed_hash, &bundle.bundle_hash)?;
        if removed {
            warn!(bundle = %bundle.bundle_hash.short(), "[dw-06] Pending bundle abandoned");
            self.events.publish(AccountEvent::InternalError(
                InternalError::new(
                    ErrorKind::BundleAbandoned,
                    format!(
                        "bundle {} unconfirmed after {}s",
                        bundle.bundle_hash,
                        self.config.abandon_after.as_secs()
                    ),
                )
                .with_cause(format!("attempts={}", bundle.tails.len())),
            ));
        }
        Ok(removed)
    }

    async fn work(
        &self,
        bundle: &PendingBundle,
        latest: &TxHash,
        now: DateTime<Utc>,
    ) -> Result<Outcome, PromoteError> {
        let states = self
            .ledger
            .get_inclusion_states(&bundle.attachment_tails())
            .await?;
        if states.iter().any(|included| *included) {
            return self.confirm(bundle);
        }

        if self
            .ledger
            .check_consistency(std::slice::from_ref(latest))
            .await?
        {
            self.promote(bundle, latest, now).await
        } else {
            self.reattach(bundle, now).await
        }
    }

    fn confirm(&self, bundle: &PendingBundle) -> Result<Outcome, PromoteError> {
        match self.store.mark_confirmed(&self.seed_hash, &bundle.bundle_hash) {
            Ok(true) => {
                info!(bundle = %bundle.bundle_hash.short(), "[dw-06] Outgoing bundle confirmed");
                metric_inc!(BUNDLES_CONFIRMED);
                self.events.publish(AccountEvent::Confirmed {
                    tails: tails_of(&bundle.transactions),
                });
                Ok(Outcome::Confirmed)
            }
            Ok(false) | Err(StoreError::UnknownBundle(_)) => Ok(Outcome::Gone),
            Err(e) => Err(e.into()),
        }
    }

    async fn promote(
        &self,
        bundle: &PendingBundle,
        latest: &TxHash,
        now: DateTime<Utc>,
    ) -> Result<Outcome, PromoteError> {
        let tips = self
            .ledger
            .get_transactions_to_approve(self.config.depth, Some(latest))
            .await?;
        let tips = Tips {
            trunk: latest.clone(),
            branch: tips.branch,
        };

        let mut builder = BundleBuilder::new(now.timestamp().max(0) as u64);
        builder.add_output(OutputSpec {
            address: Address::null(),
            value: 0,
            tag: PROMOTION_TAG.to_string(),
            message: None,
        });
        let promotion = builder.build_unsigned()?;
        let tail = self.publish(&tips, &promotion).await?;

        if !self.record_tail(bundle, &tail, TailKind::Promotion, now)? {
            return Ok(Outcome::Gone);
        }
        info!(
            bundle = %bundle.bundle_hash.short(),
            promotion = %tail.short(),
            "[dw-06] Bundle promoted"
        );
        metric_inc!(BUNDLES_PROMOTED);
        self.events.publish(AccountEvent::Promotion {
            bundle_hash: bundle.bundle_hash.clone(),
            promotion_tail_tx_hash: tail.clone(),
        });
        Ok(Outcome::Promoted(tail))
    }

    async fn reattach(
        &self,
        bundle: &PendingBundle,
        now: DateTime<Utc>,
    ) -> Result<Outcome, PromoteError> {
        let tips = self
            .ledger
            .get_transactions_to_approve(self.config.depth, None)
            .await?;
        let tail = self.publish(&tips, &bundle.transactions).await?;

        if !self.record_tail(bundle, &tail, TailKind::Attachment, now)? {
            return Ok(Outcome::Gone);
        }
        info!(
            bundle = %bundle.bundle_hash.short(),
            reattachment = %tail.short(),
            "[dw-06] Bundle reattached"
        );
        metric_inc!(BUNDLES_REATTACHED);
        self.events.publish(AccountEvent::Reattachment {
            bundle_hash: bundle.bundle_hash.clone(),
            reattachment_tail_tx_hash: tail.clone(),
        });
        Ok(Outcome::Reattached(tail))
    }

    /// Attach and broadcast `txs`, returning the new tail hash.
    async fn publish(&self, tips: &Tips, txs: &[Transaction]) -> Result<TxHash, PromoteError> {
        let attached = self
            .ledger
            .attach_to_tangle(tips, self.config.mwm, txs)
            .await?;
        self.ledger.broadcast_and_store(&attached).await?;
        attached
            .iter()
            .find(|tx| tx.is_tail())
            .map(|tx| tx.hash.clone())
            .ok_or_else(|| {
                PromoteError::Crypto(shared_crypto::CryptoError::MalformedBundle(
                    "attached bundle has no tail".into(),
                ))
            })
    }

    /// `false` when the bundle left the pending set meanwhile.
    fn record_tail(
        &self,
        bundle: &PendingBundle,
        hash: &TxHash,
        kind: TailKind,
        at: DateTime<Utc>,
    ) -> Result<bool, PromoteError> {
        let tail = PendingTail {
            hash: hash.clone(),
            kind,
            at,
        };
        match self
            .store
            .append_tail(&self.seed_hash, &bundle.bundle_hash, tail)
        {
            Ok(()) => Ok(true),
            Err(StoreError::UnknownBundle(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BackgroundTask for Promoter {
    fn name(&self) -> &'static str {
        "promoter"
    }

    fn interval(&self) -> Duration {
        self.config.interval
    }

    async fn tick(&self) -> Result<(), TaskError> {
        self.promote_once()
            .await
            .map(|_| ())
            .map_err(TaskError::from)
    }
}
