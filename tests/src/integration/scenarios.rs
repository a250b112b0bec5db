//! # Account Scenarios
//!
//! End-to-end flows across the account, poller, promoter, store and bus,
//! against the simulated ledger.
//!
//! | Test | Flow |
//! |------|------|
//! | deposit | allocate → incoming transfer → confirmation → balance |
//! | insufficient | send above balance → error, no event |
//! | settlement | send → promotion → reattachment → confirmation |
//! | change | expired deposit spent → change → polls past confirmation |
//! | magnet | link grammar accepted and rejected |
//! | oracle | short-lived recipient → refusal, no publication |
//! | shutdown | shutdown during an in-flight poll |

#[cfg(test)]
mod tests {
    use crate::fixtures::{drain, external, parked_settings, Fixture};
    use chrono::Duration as ChronoDuration;
    use dw_03_account_store::KvAccountStore;
    use dw_04_deposit_conditions::{Conditions, ConditionsError, DepositConditions};
    use dw_07_account::{AccountError, Recipient};
    use shared_bus::{AccountEvent, EventKind};
    use shared_types::ErrorKind;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn kinds(events: &[AccountEvent]) -> Vec<EventKind> {
        events.iter().map(AccountEvent::kind).collect()
    }

    // =========================================================================
    // INCOMING
    // =========================================================================

    #[tokio::test]
    async fn test_incoming_deposit_is_announced_then_received() {
        let f = Fixture::start().await;
        let mut listener = f.listen().await;
        let cda = f.multi_use(7).await;

        let bundle = f.ledger.inject_transfer(&cda.address, 100);
        let report = f.poller.poll_once().await.unwrap();
        assert_eq!(report.receiving, 1);
        assert_eq!(kinds(&drain(&mut listener).await), vec![EventKind::ReceivingDeposit]);
        assert_eq!(f.account.total_balance().await.unwrap(), 0);

        f.ledger.confirm_bundle(&bundle[0].bundle);
        let report = f.poller.poll_once().await.unwrap();
        assert_eq!(report.received, 1);
        match drain(&mut listener).await.as_slice() {
            [AccountEvent::ReceivedDeposit { tails }] => {
                assert_eq!(tails[0].bundle, bundle[0].bundle);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(f.account.total_balance().await.unwrap(), 100);
        // A multi-use address only funds sends once it stops accepting deposits.
        assert_eq!(f.account.available_balance().await.unwrap(), 0);
        f.clock.advance(ChronoDuration::days(7) + ChronoDuration::seconds(1));
        assert_eq!(f.account.available_balance().await.unwrap(), 100);
    }

    // =========================================================================
    // OUTGOING
    // =========================================================================

    #[tokio::test]
    async fn test_send_above_balance_is_refused_silently() {
        let f = Fixture::start().await;
        f.funded(50).await;
        let mut listener = f.listen().await;

        let err = f
            .account
            .send(vec![Recipient::new(external('X'), 100)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccountError::InsufficientBalance {
                available: 50,
                required: 100
            }
        ));
        assert!(drain(&mut listener).await.is_empty());
        assert!(f.ledger.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_outgoing_bundle_is_promoted_reattached_and_confirmed() {
        let f = Fixture::start().await;
        f.funded(100).await;
        let mut listener = f.listen().await;

        f.account
            .send(vec![Recipient::new(external('X'), 30)])
            .await
            .unwrap();
        let state = f.account.state_snapshot().await.unwrap();
        assert_eq!(state.pending.len(), 1);
        let original = state.pending.values().next().unwrap().tails[0].hash.clone();

        // First tick: the original tail is still consistent, so it is promoted.
        f.pass_promote_interval();
        assert_eq!(f.promoter.promote_once().await.unwrap().promoted, 1);

        // Second tick: the original can no longer be approved.
        f.ledger.set_consistent(&original, false);
        f.pass_promote_interval();
        assert_eq!(f.promoter.promote_once().await.unwrap().reattached, 1);

        let state = f.account.state_snapshot().await.unwrap();
        let pending = state.pending.values().next().unwrap();
        let reattachment = pending.latest_attachment().unwrap().clone();
        assert_ne!(reattachment, original);

        f.ledger.confirm_tail(&reattachment);
        assert_eq!(f.poller.poll_once().await.unwrap().confirmed, 1);
        f.pass_promote_interval();
        f.promoter.promote_once().await.unwrap();

        assert_eq!(
            kinds(&drain(&mut listener).await),
            vec![
                EventKind::Sending,
                EventKind::Promotion,
                EventKind::Reattachment,
                EventKind::Confirmed,
            ]
        );
        assert!(f.account.state_snapshot().await.unwrap().pending.is_empty());
    }

    #[tokio::test]
    async fn test_change_of_spent_deposit_is_not_received_as_deposit() {
        let f = Fixture::start().await;
        let mut listener = f.listen().await;
        let cda = f.multi_use(7).await;
        let deposit = f.ledger.inject_transfer(&cda.address, 100);
        f.ledger.confirm_bundle(&deposit[0].bundle);
        f.poller.poll_once().await.unwrap();
        assert_eq!(
            kinds(&drain(&mut listener).await),
            vec![EventKind::ReceivingDeposit, EventKind::ReceivedDeposit]
        );

        // Past its timeout the deposit address is spendable and unwatched.
        f.clock.advance(ChronoDuration::days(7) + ChronoDuration::seconds(1));
        let sent = f
            .account
            .send(vec![Recipient::new(external('X'), 30)])
            .await
            .unwrap();
        f.ledger.confirm_bundle(&sent[0].bundle);
        for _ in 0..3 {
            f.poller.poll_once().await.unwrap();
        }

        assert_eq!(
            kinds(&drain(&mut listener).await),
            vec![EventKind::Sending, EventKind::Confirmed]
        );
        let state = f.account.state_snapshot().await.unwrap();
        assert!(state.pending.is_empty());
        // The drained input is pruned; only the change address remains.
        assert!(!state.deposits.contains_key(&cda.address));
        assert_eq!(state.deposits.len(), 1);
        let change = state.deposits.values().next().unwrap();
        assert!(change.observed_incoming_bundles.is_empty());
        assert_eq!(f.account.total_balance().await.unwrap(), 70);
    }

    #[tokio::test]
    async fn test_magnet_links() {
        let address = "A".repeat(81);
        let valid = format!("iota://{address}/?t=1700000000&m=1");
        let cda = DepositConditions::from_magnet(&valid).unwrap();
        assert!(cda.multi_use);
        assert_eq!(cda.timeout_unix(), 1_700_000_000);
        assert_eq!(cda.to_magnet(), valid);

        let invalid = format!("iota://{address}/?t=1700000000&m=1&am=5");
        assert!(matches!(
            DepositConditions::from_magnet(&invalid),
            Err(ConditionsError::InvalidMagnet(_))
        ));
        assert_eq!(
            Recipient::from_magnet(&invalid, 1).unwrap_err().kind(),
            ErrorKind::InvalidMagnet
        );
    }

    #[tokio::test]
    async fn test_oracle_refuses_short_lived_recipient() {
        let f = Fixture::start().await;
        f.funded(100).await;
        let mut listener = f.listen().await;

        let target = DepositConditions::new(
            external('Y'),
            &Conditions::multi_use(f.clock.current() + ChronoDuration::hours(4)),
        )
        .unwrap();
        match f
            .account
            .send(vec![Recipient::from_conditions(target, 30)])
            .await
        {
            Err(AccountError::OracleRefused { reason }) => assert_eq!(reason, "timeout < 5h"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(f.ledger.broadcasts().is_empty());
        assert!(drain(&mut listener).await.is_empty());
        assert!(f.account.state_snapshot().await.unwrap().pending.is_empty());
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_during_poll_drains_within_grace() {
        let mut settings = parked_settings();
        settings.poller.interval = Duration::from_millis(50);
        settings.shutdown_grace = Duration::from_secs(2);
        let f = Fixture::start_with(Arc::new(KvAccountStore::in_memory()), settings).await;
        let mut listener = f.listen().await;
        f.multi_use(7).await;

        f.ledger.set_read_delay(Some(Duration::from_millis(300)));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(f.ledger.reads() > 0, "a poll should be in flight");

        let started = Instant::now();
        f.account.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(2));

        let events = drain(&mut listener).await;
        assert_eq!(events.last(), Some(&AccountEvent::Shutdown));
        assert_eq!(
            events.iter().filter(|e| **e == AccountEvent::Shutdown).count(),
            1
        );
        assert!(matches!(
            f.account.available_balance().await,
            Err(AccountError::NotRunning)
        ));
    }
}
