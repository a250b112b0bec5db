//! Shared setup for the cross-crate tests.
//!
//! The account is started with its loops parked on hour-long intervals;
//! tests drive a poller and a promoter of their own over the same ledger,
//! store, clock and bus, one tick at a time.

use chrono::Duration as ChronoDuration;
use dw_01_time_source::test_utils::ManualClock;
use dw_02_quorum_client::test_utils::SimulatedLedger;
use dw_03_account_store::{AccountStore, KvAccountStore};
use dw_04_deposit_conditions::{Conditions, DepositConditions};
use dw_05_transfer_poller::{PollerConfig, TransferPoller};
use dw_06_promoter::{Promoter, PromoterConfig};
use dw_07_account::{Account, AccountBuilder, AccountSettings};
use shared_bus::{AccountEvent, EventBus, EventFilter, Listener};
use shared_types::Address;
use std::sync::Arc;
use std::time::Duration;

pub const SEED: &str = "DONATIONWALLETTESTSEED";
pub const START_UNIX: i64 = 1_700_000_000;

/// Interval the test-driven promoter waits between touches of a bundle.
pub const PROMOTE_INTERVAL: Duration = Duration::from_secs(30);

pub struct Fixture {
    pub ledger: Arc<SimulatedLedger>,
    pub store: Arc<dyn AccountStore>,
    pub clock: Arc<ManualClock>,
    pub bus: EventBus,
    pub account: Arc<Account>,
    pub poller: TransferPoller,
    pub promoter: Promoter,
}

/// Account settings with both loops parked.
pub fn parked_settings() -> AccountSettings {
    let mut settings = AccountSettings {
        shutdown_grace: Duration::from_secs(2),
        ..AccountSettings::default()
    };
    settings.poller.interval = Duration::from_secs(3600);
    settings.promoter.interval = Duration::from_secs(3600);
    settings
}

impl Fixture {
    pub async fn start() -> Self {
        Self::start_with(Arc::new(KvAccountStore::in_memory()), parked_settings()).await
    }

    pub async fn start_with(store: Arc<dyn AccountStore>, settings: AccountSettings) -> Self {
        let ledger = Arc::new(SimulatedLedger::new());
        let clock = Arc::new(ManualClock::at_unix(START_UNIX));
        let bus = EventBus::new();

        let account = AccountBuilder::new(ledger.clone(), store.clone())
            .seed(SEED)
            .clock(clock.clone())
            .settings(settings)
            .events(bus.clone())
            .build()
            .expect("test seed is valid");
        account.start().await.expect("account starts");
        // The account's own loops tick once on start; let that tick pass.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let seed_hash = account.seed_hash().to_string();

        let poller = TransferPoller::new(
            seed_hash.clone(),
            ledger.clone(),
            store.clone(),
            clock.clone(),
            Arc::new(bus.clone()),
            PollerConfig::default(),
        );
        let promoter = Promoter::new(
            seed_hash,
            ledger.clone(),
            store.clone(),
            clock.clone(),
            Arc::new(bus.clone()),
            PromoterConfig {
                interval: PROMOTE_INTERVAL,
                ..PromoterConfig::default()
            },
        );

        Self {
            ledger,
            store,
            clock,
            bus,
            account: Arc::new(account),
            poller,
            promoter,
        }
    }

    pub async fn listen(&self) -> Listener {
        self.account
            .events(EventFilter::all())
            .await
            .expect("account is running")
    }

    /// A multi-use deposit address valid for `days`.
    pub async fn multi_use(&self, days: i64) -> DepositConditions {
        let timeout = self.clock.current() + ChronoDuration::days(days);
        self.account
            .allocate_deposit_address(Conditions::multi_use(timeout))
            .await
            .expect("allocation succeeds")
    }

    /// A single-use deposit address already holding `amount`, so spendable.
    pub async fn funded(&self, amount: u64) -> DepositConditions {
        let timeout = self.clock.current() + ChronoDuration::days(1);
        let cda = self
            .account
            .allocate_deposit_address(Conditions::single_use(timeout, amount))
            .await
            .expect("allocation succeeds");
        self.ledger.credit(&cda.address, amount);
        cda
    }

    /// Let the promoter consider pending bundles again.
    pub fn pass_promote_interval(&self) {
        self.clock
            .advance(ChronoDuration::from_std(PROMOTE_INTERVAL).expect("small duration") + ChronoDuration::seconds(1));
    }
}

/// An address outside the account.
pub fn external(c: char) -> Address {
    Address::new(c.to_string().repeat(81)).expect("81 trytes")
}

/// Every event already queued for `listener`.
pub async fn drain(listener: &mut Listener) -> Vec<AccountEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(20), listener.recv()).await
    {
        events.push(event);
    }
    events
}
