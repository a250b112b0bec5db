//! # Donation Links
//!
//! The one deposit address the donation page advertises. It is kept in
//! `<data_dir>/current` as an opaque `ConditionsRecord`, separate from the
//! account state, and renewed once it gets within `RENEW_BEFORE_HOURS` of its
//! timeout.

use crate::errors::ServerError;
use chrono::{DateTime, Duration, Utc};
use dw_04_deposit_conditions::{Conditions, ConditionsRecord, DepositConditions};
use dw_07_account::Account;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// File name of the advertised record inside the data directory.
pub const CURRENT_RECORD: &str = "current";

/// A link this close to its timeout is replaced.
pub const RENEW_BEFORE_HOURS: i64 = 24;

pub struct DonationLinks {
    account: Arc<Account>,
    path: PathBuf,
    current: Mutex<Option<DepositConditions>>,
}

impl DonationLinks {
    /// Read the advertised record from `data_dir`, if there is one.
    ///
    /// # Errors
    ///
    /// `Record` when the file exists but does not decode, `Io` when it
    /// cannot be read.
    pub fn open(account: Arc<Account>, data_dir: &Path) -> Result<Self, ServerError> {
        let path = data_dir.join(CURRENT_RECORD);
        let current = match std::fs::read(&path) {
            Ok(bytes) => Some(ConditionsRecord::decode(&bytes)?.conditions),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(ServerError::Io { path, source }),
        };
        if let Some(cda) = &current {
            info!(address = %cda.address.short(), timeout = %cda.timeout_at, "[server] Loaded donation link");
        }
        Ok(Self {
            account,
            path,
            current: Mutex::new(current),
        })
    }

    /// The advertised deposit conditions, renewed when missing or about to expire.
    pub async fn donation_link(&self) -> Result<DepositConditions, ServerError> {
        let mut current = self.current.lock().await;
        let now = self.account.now().await?;
        if let Some(cda) = current.as_ref().filter(|cda| !needs_renewal(cda, now)) {
            return Ok(cda.clone());
        }

        let timeout = now + self.account.settings().address_validity;
        let cda = self
            .account
            .allocate_deposit_address(Conditions::multi_use(timeout))
            .await?;
        self.persist(&cda)?;
        info!(address = %cda.address.short(), timeout = %cda.timeout_at, "[server] Donation link renewed");
        *current = Some(cda.clone());
        Ok(cda)
    }

    /// The advertised link as a magnet URI.
    pub async fn magnet(&self) -> Result<String, ServerError> {
        Ok(self.donation_link().await?.to_magnet())
    }

    fn persist(&self, cda: &DepositConditions) -> Result<(), ServerError> {
        let bytes = ConditionsRecord::new(cda.clone()).encode()?;
        let io = |source| ServerError::Io {
            path: self.path.clone(),
            source,
        };
        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io)?;
        file.write_all(&bytes).map_err(io)?;
        file.sync_all().map_err(io)?;
        if let Err(source) = std::fs::rename(&temp_path, &self.path) {
            warn!(path = %self.path.display(), "[server] Could not replace donation link record");
            return Err(io(source));
        }
        Ok(())
    }
}

fn needs_renewal(cda: &DepositConditions, now: DateTime<Utc>) -> bool {
    cda.remaining(now) < Duration::hours(RENEW_BEFORE_HOURS)
}
