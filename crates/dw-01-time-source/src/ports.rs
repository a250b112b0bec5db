//! # Ports
//!
//! `Clock` is what the rest of the wallet consumes; `NtpSource` is what the
//! clock needs from the network.

use crate::domain::ClockError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Authoritative current time.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current UTC time.
    async fn now(&self) -> Result<DateTime<Utc>, ClockError>;
}

/// One network time measurement.
#[async_trait]
pub trait NtpSource: Send + Sync {
    /// `server_time - local_time` as measured against `server`.
    async fn offset(&self, server: &str) -> Result<ChronoDuration, ClockError>;
}
