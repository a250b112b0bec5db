//! # Account Properties
//!
//! Guarantees that hold across crates rather than inside one: derivation
//! is deterministic, key indices only grow, observations are deduplicated,
//! outgoing bundles settle once and listeners see events in order.

#[cfg(test)]
mod tests {
    use crate::fixtures::{drain, external, parked_settings, Fixture, SEED};
    use dw_03_account_store::KvAccountStore;
    use dw_07_account::Recipient;
    use futures::future::join_all;
    use proptest::prelude::*;
    use shared_bus::{AccountEvent, EventKind};
    use shared_crypto::{derive_address, Seed};
    use shared_types::SecurityLevel;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn count(events: &[AccountEvent], kind: EventKind) -> usize {
        events.iter().filter(|e| e.kind() == kind).count()
    }

    #[tokio::test]
    async fn test_same_seed_derives_same_addresses() {
        let a = Fixture::start().await;
        let b = Fixture::start().await;
        let seed = Seed::new(SEED).unwrap();

        for _ in 0..4 {
            let first = a.multi_use(3).await;
            let second = b.multi_use(3).await;
            assert_eq!(first.address, second.address);
        }

        let state = a.account.state_snapshot().await.unwrap();
        for record in state.deposits.values() {
            assert_eq!(
                record.conditions.address,
                derive_address(&seed, record.key_index, SecurityLevel::DEFAULT)
            );
        }
    }

    #[tokio::test]
    async fn test_key_indices_grow_across_concurrency_and_restart() {
        let dir = tempfile::tempdir().unwrap();
        let first = {
            let store = Arc::new(KvAccountStore::file(dir.path()).unwrap());
            let f = Fixture::start_with(store, parked_settings()).await;
            let allocations = join_all((0..8).map(|_| f.multi_use(3))).await;
            let addresses: BTreeSet<_> = allocations.iter().map(|c| c.address.clone()).collect();
            assert_eq!(addresses.len(), 8);

            let state = f.account.state_snapshot().await.unwrap();
            let indices: BTreeSet<u64> = state.deposits.values().map(|r| r.key_index).collect();
            assert_eq!(indices.len(), 8);
            f.account.shutdown().await;
            indices
        };

        let store = Arc::new(KvAccountStore::file(dir.path()).unwrap());
        let f = Fixture::start_with(store, parked_settings()).await;
        let next = f.multi_use(3).await;
        let state = f.account.state_snapshot().await.unwrap();
        let record = &state.deposits[&next.address];
        assert!(first.iter().all(|i| *i < record.key_index));
        assert_eq!(state.deposits.len(), 9);
    }

    #[tokio::test]
    async fn test_incoming_bundle_reported_once_per_stage() {
        let f = Fixture::start().await;
        let mut listener = f.listen().await;
        let cda = f.multi_use(7).await;
        let bundle = f.ledger.inject_transfer(&cda.address, 40);

        for _ in 0..3 {
            f.poller.poll_once().await.unwrap();
        }
        f.ledger.confirm_bundle(&bundle[0].bundle);
        for _ in 0..3 {
            f.poller.poll_once().await.unwrap();
        }

        let events = drain(&mut listener).await;
        assert_eq!(count(&events, EventKind::ReceivingDeposit), 1);
        assert_eq!(count(&events, EventKind::ReceivedDeposit), 1);
    }

    #[tokio::test]
    async fn test_outgoing_bundle_confirmed_once_by_either_loop() {
        let f = Fixture::start().await;
        f.funded(100).await;
        let mut listener = f.listen().await;

        let sent = f
            .account
            .send(vec![Recipient::new(external('X'), 60)])
            .await
            .unwrap();
        f.ledger.confirm_bundle(&sent[0].bundle);

        f.pass_promote_interval();
        let promoted = f.promoter.promote_once().await.unwrap();
        let polled = f.poller.poll_once().await.unwrap();
        f.pass_promote_interval();
        let again = f.promoter.promote_once().await.unwrap();

        assert_eq!(promoted.confirmed + polled.confirmed + again.confirmed, 1);
        let events = drain(&mut listener).await;
        assert_eq!(count(&events, EventKind::Confirmed), 1);
        assert_eq!(count(&events, EventKind::Promotion), 0);
        assert!(f.account.state_snapshot().await.unwrap().pending.is_empty());
    }

    #[tokio::test]
    async fn test_listeners_see_receiving_before_received() {
        let f = Fixture::start().await;
        let mut first = f.listen().await;
        let mut second = f.listen().await;
        let cda = f.multi_use(7).await;

        // Already confirmed when first seen: both events come from one poll.
        let bundle = f.ledger.inject_transfer(&cda.address, 10);
        f.ledger.confirm_bundle(&bundle[0].bundle);
        f.poller.poll_once().await.unwrap();

        let expected = vec![EventKind::ReceivingDeposit, EventKind::ReceivedDeposit];
        for listener in [&mut first, &mut second] {
            let kinds: Vec<_> = drain(listener).await.iter().map(AccountEvent::kind).collect();
            assert_eq!(kinds, expected);
        }
    }

    proptest! {
        #[test]
        fn prop_derivation_is_stable_and_index_unique(a in 0u64..10_000, b in 0u64..10_000) {
            let seed = Seed::new(SEED).unwrap();
            let at_a = derive_address(&seed, a, SecurityLevel::DEFAULT);
            prop_assert_eq!(&at_a, &derive_address(&seed, a, SecurityLevel::DEFAULT));
            if a != b {
                prop_assert_ne!(at_a, derive_address(&seed, b, SecurityLevel::DEFAULT));
            }
        }
    }
}
