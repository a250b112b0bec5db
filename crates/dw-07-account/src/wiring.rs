//! # Wiring
//!
//! Turns a validated `WalletConfig` into an `Account` backed by the real
//! adapters: HTTP quorum client, SNTP clock, embedded store.
//!
//! ```text
//! WalletConfig ──→ QuorumClient::http ──┐
//!              ──→ KvAccountStore ──────┤
//!              ──→ NtpClock (+ bus) ────┼──→ AccountBuilder ──→ Account
//!              ──→ CompositeOracle ─────┘
//! ```

use crate::builder::AccountBuilder;
use crate::config::{ConfigError, StoreBackend, WalletConfig};
use crate::domain::AccountError;
use crate::oracle::{CompositeOracle, TimeoutMarginOracle};
use crate::service::Account;
use dw_01_time_source::{NtpClock, UdpNtpSource};
use dw_02_quorum_client::QuorumClient;
use dw_03_account_store::{AccountStore, KvAccountStore, StoreError};
use shared_bus::EventBus;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

/// Failure to assemble the account.
#[derive(Debug, Error)]
pub enum WiringError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Account(#[from] AccountError),
}

/// Build the account described by `config`. The account is not started.
///
/// # Errors
///
/// `Config` for an invalid configuration, `Account(Store)` when the store
/// cannot be opened (including the mongodb backend, which this build does
/// not ship), `Account(Quorum)` when the HTTP client cannot be created.
#[instrument(skip(config), fields(nodes = config.quorum.nodes.len()))]
pub fn open_account(config: &WalletConfig) -> Result<Account, WiringError> {
    config.validate()?;
    let security = config.security()?;

    let ledger = QuorumClient::http(config.quorum_settings()).map_err(AccountError::from)?;
    let store = open_store(config)?;

    let bus = EventBus::with_capacity(config.event_channel_capacity);
    let clock_config = config.clock_config();
    let ntp = UdpNtpSource::new(clock_config.query_timeout);
    let clock = NtpClock::new(clock_config, Arc::new(ntp)).with_events(Arc::new(bus.clone()));

    let margin = TimeoutMarginOracle::hours(config.send_margin_hours as i64);
    let oracle = CompositeOracle::new().with(Arc::new(margin));

    let account = AccountBuilder::new(Arc::new(ledger), store)
        .seed(config.seed.clone())
        .clock(Arc::new(clock))
        .security_level(security)
        .settings(config.account_settings())
        .mwm(config.mwm)
        .depth(config.gtta_depth)
        .oracle(Arc::new(oracle))
        .events(bus)
        .build()?;

    info!(
        account = %&account.seed_hash()[..12],
        primary = %config.quorum.primary_node,
        "[dw-07] Account wired"
    );
    Ok(account)
}

fn open_store(config: &WalletConfig) -> Result<Arc<dyn AccountStore>, WiringError> {
    match config.store_backend() {
        Some(StoreBackend::Embedded(dir)) => Ok(open_embedded(dir).map_err(AccountError::from)?),
        Some(StoreBackend::Mongo(mongo)) => {
            info!(dbname = %mongo.dbname, "[dw-07] mongodb backend requested");
            Err(AccountError::from(StoreError::Unavailable(
                "mongodb backend not available in this build".into(),
            ))
            .into())
        }
        None => Err(ConfigError::Invalid("data_dir or mongodb is required".into()).into()),
    }
}

#[cfg(not(feature = "rocksdb"))]
fn open_embedded(dir: &Path) -> Result<Arc<dyn AccountStore>, StoreError> {
    Ok(Arc::new(KvAccountStore::file(dir)?))
}

#[cfg(feature = "rocksdb")]
fn open_embedded(dir: &Path) -> Result<Arc<dyn AccountStore>, StoreError> {
    use dw_03_account_store::{RocksDbConfig, RocksDbStore};
    let kv = RocksDbStore::open(RocksDbConfig::new(dir.join("rocksdb")))?;
    Ok(Arc::new(KvAccountStore::new(kv)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ErrorKind;

    fn config(store: &str) -> WalletConfig {
        WalletConfig::from_json(&format!(
            r#"{{
                "seed": "WIRINGTESTSEED",
                {store},
                "quorum": {{
                    "primary_node": "http://127.0.0.1:14265",
                    "nodes": ["http://127.0.0.1:14265"],
                    "threshold": 1.0,
                    "no_response_tolerance": 0.0,
                    "max_subtangle_milestone_delta": 2,
                    "timeout": 5
                }},
                "mwm": 9,
                "gtta_depth": 3,
                "security_level": 2,
                "transfer_poll_interval": 10,
                "promote_reattach_interval": 10,
                "address_validity_timeout_days": 7,
                "time": {{ "ntp_server": "pool.ntp.org:123" }}
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_mongodb_backend_is_unavailable() {
        let cfg = config(
            r#""mongodb": { "uri": "mongodb://localhost", "dbname": "dw", "collname": "accounts" }"#,
        );
        match open_account(&cfg) {
            Err(WiringError::Account(e)) => assert_eq!(e.kind(), ErrorKind::StoreUnavailable),
            Err(other) => panic!("unexpected {other}"),
            Ok(_) => panic!("mongodb backend must not open"),
        }
    }

    #[test]
    fn test_embedded_backend_wires_account() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&format!(r#""data_dir": {:?}"#, dir.path().display().to_string()));
        let account = open_account(&cfg).unwrap();
        assert_eq!(account.settings().promoter.mwm, 9);
        assert!(!account.is_running());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut cfg = config(r#""data_dir": "/tmp/unused""#);
        cfg.security_level = 7;
        assert!(matches!(open_account(&cfg), Err(WiringError::Config(_))));
    }
}
