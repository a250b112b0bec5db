//! The CDA type.

use crate::errors::ConditionsError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared_types::Address;

fn check_policy(multi_use: bool, expected_amount: Option<u64>) -> Result<(), ConditionsError> {
    match (multi_use, expected_amount) {
        (true, Some(_)) => Err(ConditionsError::InvalidConditions(
            "multi_use and expected_amount are exclusive".into(),
        )),
        (false, None) => Err(ConditionsError::InvalidConditions(
            "either multi_use or expected_amount is required".into(),
        )),
        (false, Some(0)) => Err(ConditionsError::InvalidConditions(
            "expected_amount must be positive".into(),
        )),
        _ => Ok(()),
    }
}

fn whole_seconds(at: DateTime<Utc>) -> Result<DateTime<Utc>, ConditionsError> {
    DateTime::from_timestamp(at.timestamp(), 0)
        .ok_or_else(|| ConditionsError::InvalidConditions(format!("timeout_at {at} out of range")))
}

/// Conditions requested for a new deposit address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    pub timeout_at: DateTime<Utc>,
    #[serde(default)]
    pub multi_use: bool,
    #[serde(default)]
    pub expected_amount: Option<u64>,
}

impl Conditions {
    /// Accept any number of credits until `timeout_at`.
    pub fn multi_use(timeout_at: DateTime<Utc>) -> Self {
        Self {
            timeout_at,
            multi_use: true,
            expected_amount: None,
        }
    }

    /// Expect exactly `amount`.
    pub fn single_use(timeout_at: DateTime<Utc>, amount: u64) -> Self {
        Self {
            timeout_at,
            multi_use: false,
            expected_amount: Some(amount),
        }
    }

    pub fn validate(&self) -> Result<(), ConditionsError> {
        check_policy(self.multi_use, self.expected_amount)
    }

    /// Validate and additionally require `timeout_at` after `now`.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), ConditionsError> {
        self.validate()?;
        if self.timeout_at <= now {
            return Err(ConditionsError::InvalidConditions(format!(
                "timeout_at {} is not after {now}",
                self.timeout_at
            )));
        }
        Ok(())
    }
}

/// A conditional deposit address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositConditions {
    pub address: Address,
    /// Absolute expiry, whole seconds.
    pub timeout_at: DateTime<Utc>,
    pub multi_use: bool,
    pub expected_amount: Option<u64>,
}

impl DepositConditions {
    /// Bind `conditions` to `address`. `timeout_at` is truncated to seconds.
    pub fn new(address: Address, conditions: &Conditions) -> Result<Self, ConditionsError> {
        conditions.validate()?;
        Ok(Self {
            address,
            timeout_at: whole_seconds(conditions.timeout_at)?,
            multi_use: conditions.multi_use,
            expected_amount: conditions.expected_amount,
        })
    }

    pub(crate) fn from_parts(
        address: Address,
        timeout_unix: i64,
        multi_use: bool,
        expected_amount: Option<u64>,
    ) -> Result<Self, ConditionsError> {
        check_policy(multi_use, expected_amount)?;
        let timeout_at = DateTime::from_timestamp(timeout_unix, 0).ok_or_else(|| {
            ConditionsError::InvalidConditions(format!("timeout {timeout_unix} out of range"))
        })?;
        Ok(Self {
            address,
            timeout_at,
            multi_use,
            expected_amount,
        })
    }

    pub fn validate(&self) -> Result<(), ConditionsError> {
        check_policy(self.multi_use, self.expected_amount)?;
        if self.timeout_at.timestamp_subsec_nanos() != 0 {
            return Err(ConditionsError::InvalidConditions(
                "timeout_at has sub-second precision".into(),
            ));
        }
        Ok(())
    }

    /// The request these conditions satisfy.
    pub fn conditions(&self) -> Conditions {
        Conditions {
            timeout_at: self.timeout_at,
            multi_use: self.multi_use,
            expected_amount: self.expected_amount,
        }
    }

    pub fn timeout_unix(&self) -> i64 {
        self.timeout_at.timestamp()
    }

    /// Live while `now < timeout_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.timeout_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_live(now)
    }

    /// Time left until expiry; negative once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.timeout_at - now
    }
}
