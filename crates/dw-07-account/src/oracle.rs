//! Send oracles.
//!
//! The default refuses recipients whose deposit address expires within
//! five hours, or has already expired.

use crate::ports::{OracleVerdict, SendOracle};
use chrono::{DateTime, Duration, Utc};
use dw_04_deposit_conditions::DepositConditions;
use std::sync::Arc;

/// Default margin between now and a recipient's timeout.
pub const DEFAULT_SEND_MARGIN_HOURS: i64 = 5;

/// Refuses recipients that expire within `margin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutMarginOracle {
    margin: Duration,
}

impl TimeoutMarginOracle {
    pub fn new(margin: Duration) -> Self {
        Self { margin }
    }

    pub fn hours(hours: i64) -> Self {
        Self::new(Duration::hours(hours))
    }
}

impl Default for TimeoutMarginOracle {
    fn default() -> Self {
        Self::hours(DEFAULT_SEND_MARGIN_HOURS)
    }
}

impl SendOracle for TimeoutMarginOracle {
    fn ok_to_send(&self, conditions: &DepositConditions, now: DateTime<Utc>) -> OracleVerdict {
        if conditions.is_expired(now) {
            return OracleVerdict::Refuse("deposit address expired".into());
        }
        if conditions.remaining(now) < self.margin {
            return OracleVerdict::Refuse(format!("timeout < {}h", self.margin.num_hours()));
        }
        OracleVerdict::Allow
    }
}

/// Every source must allow; the first refusal wins.
#[derive(Clone, Default)]
pub struct CompositeOracle {
    sources: Vec<Arc<dyn SendOracle>>,
}

impl CompositeOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: Arc<dyn SendOracle>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SendOracle for CompositeOracle {
    fn ok_to_send(&self, conditions: &DepositConditions, now: DateTime<Utc>) -> OracleVerdict {
        self.sources
            .iter()
            .map(|source| source.ok_to_send(conditions, now))
            .find(|verdict| !verdict.is_allowed())
            .unwrap_or(OracleVerdict::Allow)
    }
}
