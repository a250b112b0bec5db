//! # Account Service
//!
//! The facade over time source, quorum client, store, bus and the two
//! background loops.
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──start()──→ Running ──shutdown()──→ Stopped
//! ```
//!
//! Operations take a read share of `ops`; `shutdown` takes the write share
//! once the loops stopped, so it waits for in-flight operations (up to the
//! grace period) and every later operation sees `Stopped`.
//!
//! ## Send
//!
//! select inputs → build and sign → tips → attach → persist pending →
//! `Sending` → broadcast. Inputs are reserved in memory until the send
//! returns, so two concurrent sends never pick the same address. A failed
//! broadcast leaves the bundle pending; the promoter reattaches it.

use crate::config::AccountSettings;
use crate::domain::{is_spendable, select_inputs, unspent, AccountError, Candidate, Recipient};
use crate::ports::{OracleVerdict, SendOracle};
use crate::scheduler::Scheduler;
use chrono::{DateTime, Utc};
use dw_01_time_source::Clock;
use dw_02_quorum_client::LedgerApi;
use dw_03_account_store::{AccountState, AccountStore, DepositRecord, PendingBundle};
use dw_04_deposit_conditions::{Conditions, DepositConditions};
use dw_05_transfer_poller::TransferPoller;
use dw_06_promoter::Promoter;
use dw_telemetry::{metric_inc, ADDRESSES_ALLOCATED, BUNDLES_SENT};
use parking_lot::Mutex;
use shared_bus::{AccountEvent, EventBus, EventFilter, EventPublisher, InternalError, Listener};
use shared_crypto::{
    derive_address, BundleBuilder, CryptoError, InputSpec, OutputSpec, Seed, DEFAULT_TAG,
};
use shared_types::{tails_of, Address, SecurityLevel, Transaction};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Releases reserved inputs when a send ends, however it ends.
struct Reservation<'a> {
    reserved: &'a Mutex<BTreeSet<Address>>,
    inputs: Vec<Candidate>,
}

impl Reservation<'_> {
    fn total(&self) -> u64 {
        self.inputs.iter().map(|c| c.balance).sum()
    }

    fn addresses(&self) -> Vec<Address> {
        self.inputs.iter().map(|c| c.address.clone()).collect()
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let mut reserved = self.reserved.lock();
        for input in &self.inputs {
            reserved.remove(&input.address);
        }
    }
}

/// The single account of this process.
pub struct Account {
    seed: Seed,
    seed_hash: String,
    security: SecurityLevel,
    ledger: Arc<dyn LedgerApi>,
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    bus: EventBus,
    oracle: Arc<dyn SendOracle>,
    settings: AccountSettings,
    state: AtomicU8,
    ops: RwLock<()>,
    reserved: Mutex<BTreeSet<Address>>,
    scheduler: Scheduler,
}

impl Account {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        seed: Seed,
        security: SecurityLevel,
        ledger: Arc<dyn LedgerApi>,
        store: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        bus: EventBus,
        oracle: Arc<dyn SendOracle>,
        settings: AccountSettings,
    ) -> Self {
        let scheduler = Scheduler::new(Arc::new(bus.clone()), settings.shutdown_grace);
        Self {
            seed_hash: seed.hash(),
            seed,
            security,
            ledger,
            store,
            clock,
            bus,
            oracle,
            settings,
            state: AtomicU8::new(CREATED),
            ops: RwLock::new(()),
            reserved: Mutex::new(BTreeSet::new()),
            scheduler,
        }
    }

    /// Stable account identity.
    pub fn seed_hash(&self) -> &str {
        &self.seed_hash
    }

    pub fn settings(&self) -> &AccountSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// Load or create the persisted state and launch the background loops.
    ///
    /// # Errors
    ///
    /// `AlreadyStarted` when running, `NotRunning` after shutdown, `Store`
    /// when the state cannot be loaded (the account stays startable).
    pub async fn start(&self) -> Result<(), AccountError> {
        match self
            .state
            .compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(RUNNING) => return Err(AccountError::AlreadyStarted),
            Err(_) => return Err(AccountError::NotRunning),
        }

        let state = match self.store.load_or_create(&self.seed_hash) {
            Ok(state) => state,
            Err(e) => {
                self.state.store(CREATED, Ordering::Release);
                return Err(e.into());
            }
        };

        let events: Arc<dyn EventPublisher> = Arc::new(self.bus.clone());
        self.scheduler.spawn(Arc::new(TransferPoller::new(
            self.seed_hash.clone(),
            self.ledger.clone(),
            self.store.clone(),
            self.clock.clone(),
            events.clone(),
            self.settings.poller.clone(),
        )));
        self.scheduler.spawn(Arc::new(Promoter::new(
            self.seed_hash.clone(),
            self.ledger.clone(),
            self.store.clone(),
            self.clock.clone(),
            events,
            self.settings.promoter.clone(),
        )));

        info!(
            account = %&self.seed_hash[..12],
            deposits = state.deposits.len(),
            pending = state.pending.len(),
            next_key_index = state.next_key_index,
            "[dw-07] Account started"
        );
        Ok(())
    }

    /// Stop the loops, drain operations, close the store and the bus.
    ///
    /// Idempotent; listeners receive `Shutdown` as their last event.
    pub async fn shutdown(&self) {
        if self.state.swap(STOPPED, Ordering::AcqRel) == STOPPED {
            return;
        }
        info!(account = %&self.seed_hash[..12], "[dw-07] Shutting down");

        self.scheduler.stop().await;
        match tokio::time::timeout(self.settings.shutdown_grace, self.ops.write()).await {
            Ok(_drained) => debug!("[dw-07] In-flight operations drained"),
            Err(_) => warn!(
                grace_ms = self.settings.shutdown_grace.as_millis() as u64,
                "[dw-07] Operations still in flight after grace period"
            ),
        }
        if let Err(e) = self.store.close() {
            warn!(error = %e, "[dw-07] Store close failed");
        }
        self.bus.close();
        info!("[dw-07] Account stopped");
    }

    /// Authoritative time, as the account sees it.
    pub async fn now(&self) -> Result<DateTime<Utc>, AccountError> {
        Ok(self.clock.now().await?)
    }

    /// Watch that holds the first background panic.
    pub fn fatal(&self) -> watch::Receiver<Option<InternalError>> {
        self.scheduler.fatal()
    }

    /// Register a listener for `filter`.
    pub async fn events(&self, filter: EventFilter) -> Result<Listener, AccountError> {
        let _op = self.enter().await?;
        Ok(self.bus.subscribe(filter)?)
    }

    /// Allocate a fresh deposit address under `conditions`.
    ///
    /// # Errors
    ///
    /// `Conditions` when the policy is invalid or `timeout_at` is not in
    /// the future, `Clock` without authoritative time.
    pub async fn allocate_deposit_address(
        &self,
        conditions: Conditions,
    ) -> Result<DepositConditions, AccountError> {
        let _op = self.enter().await?;
        let now = self.clock.now().await?;
        conditions.validate_at(now)?;
        self.allocate(&conditions)
    }

    /// Pay `recipients` from eligible deposit addresses.
    ///
    /// Returns the attached bundle. Nothing is published when the oracle
    /// refuses a recipient or the balance does not cover the transfer.
    pub async fn send(&self, recipients: Vec<Recipient>) -> Result<Vec<Transaction>, AccountError> {
        let _op = self.enter().await?;
        if recipients.is_empty() {
            return Err(AccountError::InvalidTransfer("no recipients".into()));
        }
        let now = self.clock.now().await?;
        self.consult_oracle(&recipients, now)?;

        let required = recipients
            .iter()
            .try_fold(0u64, |sum, r| sum.checked_add(r.value))
            .ok_or_else(|| AccountError::InvalidTransfer("total value overflows".into()))?;
        let reservation = self.reserve_inputs(required, now).await?;
        let change = reservation.total() - required;

        let mut builder = BundleBuilder::new(now.timestamp().max(0) as u64);
        for recipient in &recipients {
            builder.add_output(OutputSpec {
                address: recipient.address.clone(),
                value: recipient.value,
                tag: recipient.tag.clone(),
                message: recipient.message.clone(),
            });
        }
        if change > 0 {
            let timeout = now + self.settings.address_validity;
            let remainder = self.allocate(&Conditions::multi_use(timeout))?;
            debug!(address = %remainder.address.short(), change, "[dw-07] Change address allocated");
            builder.add_output(OutputSpec {
                address: remainder.address,
                value: change,
                tag: DEFAULT_TAG.to_string(),
                message: None,
            });
        }
        for input in &reservation.inputs {
            builder.add_input(InputSpec {
                address: input.address.clone(),
                balance: input.balance,
                key_index: input.key_index,
                security: self.security,
            });
        }
        let bundle = if reservation.inputs.is_empty() {
            builder.build_unsigned()?
        } else {
            builder.build(&self.seed)?
        };

        let promoter = &self.settings.promoter;
        let tips = self
            .ledger
            .get_transactions_to_approve(promoter.depth, None)
            .await?;
        let attached = self
            .ledger
            .attach_to_tangle(&tips, promoter.mwm, &bundle)
            .await?;
        let pending = PendingBundle::from_attached(attached.clone(), now).ok_or_else(|| {
            CryptoError::MalformedBundle("attached bundle has no tail".into())
        })?;
        let bundle_hash = pending.bundle_hash.clone();

        self.store
            .mark_spent(&self.seed_hash, &reservation.addresses())?;
        self.store.add_pending(&self.seed_hash, pending)?;
        metric_inc!(BUNDLES_SENT);
        self.bus.publish(AccountEvent::Sending {
            tails: tails_of(&attached),
        });

        if let Err(e) = self.ledger.broadcast_and_store(&attached).await {
            warn!(
                bundle = %bundle_hash.short(),
                error = %e,
                "[dw-07] Broadcast failed, bundle left to the promoter"
            );
        }
        info!(
            bundle = %bundle_hash.short(),
            value = required,
            inputs = reservation.inputs.len(),
            change,
            "[dw-07] Bundle sent"
        );
        Ok(attached)
    }

    /// Sum of balances that could fund a send right now.
    pub async fn available_balance(&self) -> Result<u64, AccountError> {
        let _op = self.enter().await?;
        let now = self.clock.now().await?;
        let state = self.store.load(&self.seed_hash)?;
        let records: Vec<DepositRecord> = {
            let reserved = self.reserved.lock();
            unspent(&state, &reserved).cloned().collect()
        };
        let balances = self.balances_of(&records).await?;
        Ok(records
            .iter()
            .zip(balances)
            .filter(|(record, balance)| is_spendable(record, *balance, now))
            .map(|(_, balance)| balance)
            .sum())
    }

    /// Sum of confirmed balances over every unspent deposit address.
    pub async fn total_balance(&self) -> Result<u64, AccountError> {
        let _op = self.enter().await?;
        let state = self.store.load(&self.seed_hash)?;
        let records: Vec<DepositRecord> = state
            .deposits
            .values()
            .filter(|r| !state.is_spent(r.address()))
            .cloned()
            .collect();
        Ok(self.balances_of(&records).await?.into_iter().sum())
    }

    /// The persisted account state.
    pub async fn state_snapshot(&self) -> Result<AccountState, AccountError> {
        let _op = self.enter().await?;
        Ok(self.store.load(&self.seed_hash)?)
    }

    async fn enter(&self) -> Result<RwLockReadGuard<'_, ()>, AccountError> {
        if !self.is_running() {
            return Err(AccountError::NotRunning);
        }
        let guard = self.ops.read().await;
        // Shutdown may have won the lock meanwhile.
        if !self.is_running() {
            return Err(AccountError::NotRunning);
        }
        Ok(guard)
    }

    fn allocate(&self, conditions: &Conditions) -> Result<DepositConditions, AccountError> {
        let key_index = self.store.allocate_key_index(&self.seed_hash)?;
        let address = derive_address(&self.seed, key_index, self.security);
        let cda = DepositConditions::new(address, conditions)?;
        self.store
            .add_deposit(&self.seed_hash, DepositRecord::new(key_index, cda.clone()))?;
        metric_inc!(ADDRESSES_ALLOCATED);
        info!(
            address = %cda.address.short(),
            key_index,
            timeout = %cda.timeout_at,
            multi_use = cda.multi_use,
            "[dw-07] Deposit address allocated"
        );
        Ok(cda)
    }

    fn consult_oracle(&self, recipients: &[Recipient], now: DateTime<Utc>) -> Result<(), AccountError> {
        for recipient in recipients {
            let Some(conditions) = &recipient.conditions else {
                continue;
            };
            if let OracleVerdict::Refuse(reason) = self.oracle.ok_to_send(conditions, now) {
                info!(
                    recipient = %recipient.address.short(),
                    %reason,
                    "[dw-07] Send refused by oracle"
                );
                return Err(AccountError::OracleRefused { reason });
            }
        }
        Ok(())
    }

    /// Pick and reserve inputs covering `required`.
    ///
    /// Balances are fetched without holding the reservation lock; addresses
    /// reserved meanwhile by another send are dropped before selecting.
    async fn reserve_inputs(
        &self,
        required: u64,
        now: DateTime<Utc>,
    ) -> Result<Reservation<'_>, AccountError> {
        if required == 0 {
            return Ok(Reservation {
                reserved: &self.reserved,
                inputs: Vec::new(),
            });
        }
        let state = self.store.load(&self.seed_hash)?;
        let records: Vec<DepositRecord> = {
            let reserved = self.reserved.lock();
            unspent(&state, &reserved).cloned().collect()
        };
        let balances = self.balances_of(&records).await?;
        let mut candidates: Vec<Candidate> = records
            .iter()
            .zip(balances)
            .filter(|(record, balance)| is_spendable(record, *balance, now))
            .map(|(record, balance)| Candidate {
                address: record.address().clone(),
                key_index: record.key_index,
                balance,
            })
            .collect();

        let mut reserved = self.reserved.lock();
        candidates.retain(|c| !reserved.contains(&c.address));
        let inputs = select_inputs(candidates, required)
            .map_err(|available| AccountError::InsufficientBalance { available, required })?;
        for input in &inputs {
            reserved.insert(input.address.clone());
        }
        Ok(Reservation {
            reserved: &self.reserved,
            inputs,
        })
    }

    async fn balances_of(&self, records: &[DepositRecord]) -> Result<Vec<u64>, AccountError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let addresses: Vec<Address> = records.iter().map(|r| r.address().clone()).collect();
        let balances = self.ledger.get_balances(&addresses).await?;
        if balances.len() != addresses.len() {
            return Err(dw_02_quorum_client::QuorumError::InvalidResponse {
                command: "getBalances".into(),
                reason: format!("{} balances for {} addresses", balances.len(), addresses.len()),
            }
            .into());
        }
        Ok(balances)
    }
}
