//! One wallet session: a started account, the amount paid per link, and
//! the commands typed at the prompt.

use chrono::Duration;
use dw_04_deposit_conditions::{Conditions, DepositConditions};
use dw_07_account::{Account, AccountError, Recipient};
use std::sync::Arc;
use tracing::{info, warn};

/// Lifetime of the address the wallet allocates for itself on start.
pub const OWN_ADDRESS_HOURS: i64 = 2;

/// Links expiring sooner than this are not paid.
pub const MIN_LINK_HOURS: i64 = 24;

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    State,
    Balance,
    Pay(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "state" => Self::State,
            "balance" => Self::Balance,
            link => Self::Pay(link.to_string()),
        }
    }
}

pub struct Session {
    account: Arc<Account>,
    amount: u64,
}

impl Session {
    pub fn new(account: Arc<Account>, amount: u64) -> Self {
        Self { account, amount }
    }

    /// Allocate the wallet's own deposit address and describe it.
    pub async fn greet(&self) -> Result<String, AccountError> {
        let now = self.account.now().await?;
        let own = self
            .account
            .allocate_deposit_address(Conditions::multi_use(now + Duration::hours(OWN_ADDRESS_HOURS)))
            .await?;
        info!(address = %own.address.short(), "[wallet] Own deposit address allocated");
        Ok(format!(
            "deposit address: {}\n{}",
            own.to_magnet(),
            self.balance().await?
        ))
    }

    /// Run one command and return what to print.
    pub async fn handle(&self, command: Command) -> Option<String> {
        let output = match command {
            Command::Empty => return None,
            Command::State => self.state().await,
            Command::Balance => self.balance().await,
            Command::Pay(link) => return Some(self.pay(&link).await),
        };
        Some(output.unwrap_or_else(|e| format!("error: {e}")))
    }

    async fn state(&self) -> Result<String, AccountError> {
        let state = self.account.state_snapshot().await?;
        Ok(serde_json::to_string_pretty(&state)
            .unwrap_or_else(|e| format!("state not printable: {e}")))
    }

    async fn balance(&self) -> Result<String, AccountError> {
        let usable = self.account.available_balance().await?;
        let total = self.account.total_balance().await?;
        Ok(format!("balance: usable {usable}, total {total}"))
    }

    async fn pay(&self, link: &str) -> String {
        let cda = match DepositConditions::from_magnet(link) {
            Ok(cda) => cda,
            Err(e) => return e.to_string(),
        };
        let now = match self.account.now().await {
            Ok(now) => now,
            Err(e) => return format!("error: {e}"),
        };
        if cda.remaining(now) < Duration::hours(MIN_LINK_HOURS) {
            let verdict = if cda.is_expired(now) {
                "has expired"
            } else {
                "expires within 24h"
            };
            return format!("refusing to pay: link {verdict}");
        }

        match self
            .account
            .send(vec![Recipient::from_conditions(cda, self.amount)])
            .await
        {
            Ok(bundle) => {
                let hash = bundle.first().map(|tx| tx.bundle.to_string()).unwrap_or_default();
                format!("sent {} to {}, bundle {hash}", self.amount, short(link))
            }
            Err(AccountError::InsufficientBalance {
                available,
                required,
            }) => format!("insufficient balance: {available} available, {required} required"),
            Err(e) => {
                warn!(error = %e, "[wallet] Send failed");
                format!("send failed: {e}")
            }
        }
    }
}

fn short(link: &str) -> &str {
    link.get(..24).unwrap_or(link)
}
