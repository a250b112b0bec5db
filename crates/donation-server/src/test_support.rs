use chrono::Duration as ChronoDuration;
use dw_01_time_source::test_utils::ManualClock;
use dw_02_quorum_client::test_utils::SimulatedLedger;
use dw_03_account_store::KvAccountStore;
use dw_07_account::{Account, AccountBuilder, AccountSettings};
use shared_bus::EventBus;
use std::sync::Arc;
use std::time::Duration;

pub(crate) async fn running_account() -> (Arc<Account>, Arc<ManualClock>, Arc<SimulatedLedger>) {
    running_account_on(EventBus::new()).await
}

/// Started account on `bus`, loops parked on long intervals.
pub(crate) async fn running_account_on(
    bus: EventBus,
) -> (Arc<Account>, Arc<ManualClock>, Arc<SimulatedLedger>) {
    let ledger = Arc::new(SimulatedLedger::new());
    let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
    let mut settings = AccountSettings {
        address_validity: ChronoDuration::days(7),
        shutdown_grace: Duration::from_millis(500),
        ..AccountSettings::default()
    };
    settings.poller.interval = Duration::from_secs(3600);
    settings.promoter.interval = Duration::from_secs(3600);

    let account = AccountBuilder::new(ledger.clone(), Arc::new(KvAccountStore::in_memory()))
        .seed("SERVERTESTSEED")
        .clock(clock.clone())
        .settings(settings)
        .events(bus)
        .build()
        .unwrap();
    account.start().await.unwrap();
    (Arc::new(account), clock, ledger)
}
