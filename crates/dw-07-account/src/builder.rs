//! # Account Builder
//!
//! ```rust,ignore
//! let account = AccountBuilder::new(ledger, store)
//!     .seed("MYSEED")
//!     .clock(clock)
//!     .security_level(SecurityLevel::DEFAULT)
//!     .mwm(14)
//!     .depth(3)
//!     .events(bus)
//!     .build()?;
//! ```
//!
//! Only the ledger, the store and the seed are required. The clock
//! defaults to the system clock, the oracle to a 5 h `TimeoutMarginOracle`,
//! and the bus to a fresh `EventBus`.

use crate::config::AccountSettings;
use crate::domain::AccountError;
use crate::oracle::{CompositeOracle, TimeoutMarginOracle};
use crate::ports::SendOracle;
use crate::service::Account;
use dw_01_time_source::{Clock, SystemClock};
use dw_02_quorum_client::LedgerApi;
use dw_03_account_store::AccountStore;
use shared_bus::EventBus;
use shared_crypto::{CryptoError, Seed};
use shared_types::SecurityLevel;
use std::sync::Arc;

/// Builder for `Account`.
pub struct AccountBuilder {
    ledger: Arc<dyn LedgerApi>,
    store: Arc<dyn AccountStore>,
    seed: Option<String>,
    clock: Option<Arc<dyn Clock>>,
    security: SecurityLevel,
    settings: AccountSettings,
    mwm: Option<u64>,
    depth: Option<u64>,
    oracle: Option<Arc<dyn SendOracle>>,
    bus: Option<EventBus>,
}

impl AccountBuilder {
    pub fn new(ledger: Arc<dyn LedgerApi>, store: Arc<dyn AccountStore>) -> Self {
        Self {
            ledger,
            store,
            seed: None,
            clock: None,
            security: SecurityLevel::DEFAULT,
            settings: AccountSettings::default(),
            mwm: None,
            depth: None,
            oracle: None,
            bus: None,
        }
    }

    pub fn seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn security_level(mut self, security: SecurityLevel) -> Self {
        self.security = security;
        self
    }

    /// Loop intervals, abandonment horizon, change validity and grace.
    ///
    /// `mwm` and `depth` set on the builder override the values in here,
    /// whichever order they are called in.
    pub fn settings(mut self, settings: AccountSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn mwm(mut self, mwm: u64) -> Self {
        self.mwm = Some(mwm);
        self
    }

    pub fn depth(mut self, depth: u64) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn SendOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Publish on `bus` instead of a private one.
    pub fn events(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// # Errors
    ///
    /// `Crypto(InvalidSeed)` when the seed is missing or malformed.
    pub fn build(self) -> Result<Account, AccountError> {
        let seed = match self.seed {
            Some(seed) => Seed::new(seed)?,
            None => return Err(CryptoError::InvalidSeed("no seed given".into()).into()),
        };
        let mut settings = self.settings;
        if let Some(mwm) = self.mwm {
            settings.promoter.mwm = mwm;
        }
        if let Some(depth) = self.depth {
            settings.promoter.depth = depth;
        }
        let oracle = self.oracle.unwrap_or_else(|| {
            Arc::new(CompositeOracle::new().with(Arc::new(TimeoutMarginOracle::default())))
        });

        Ok(Account::new(
            seed,
            self.security,
            self.ledger,
            self.store,
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            self.bus.unwrap_or_default(),
            oracle,
            settings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dw_02_quorum_client::test_utils::SimulatedLedger;
    use dw_03_account_store::KvAccountStore;

    fn builder() -> AccountBuilder {
        AccountBuilder::new(
            Arc::new(SimulatedLedger::new()),
            Arc::new(KvAccountStore::in_memory()),
        )
    }

    #[test]
    fn test_seed_is_required_and_validated() {
        assert!(matches!(
            builder().build(),
            Err(AccountError::Crypto(CryptoError::InvalidSeed(_)))
        ));
        assert!(builder().seed("not trytes").build().is_err());
        assert!(builder().seed("GOODSEED9").build().is_ok());
    }

    #[test]
    fn test_overrides_apply_after_settings() {
        let account = builder()
            .seed("GOODSEED9")
            .mwm(9)
            .depth(5)
            .settings(AccountSettings::default())
            .build()
            .unwrap();
        assert_eq!(account.settings().promoter.mwm, 9);
        assert_eq!(account.settings().promoter.depth, 5);
    }
}
