//! # Ports
//!
//! `SendOracle` decides whether paying into a conditional deposit address is
//! still safe. The account consults it for every recipient that carries
//! conditions, before anything is selected or published.

use chrono::{DateTime, Utc};
use dw_04_deposit_conditions::DepositConditions;

/// Answer of a send oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleVerdict {
    Allow,
    Refuse(String),
}

impl OracleVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, OracleVerdict::Allow)
    }
}

/// Veto on outgoing transfers.
pub trait SendOracle: Send + Sync {
    fn ok_to_send(&self, conditions: &DepositConditions, now: DateTime<Utc>) -> OracleVerdict;
}
