//! # Clock Domain
//!
//! Errors and the offset cache policy.

use chrono::Duration as ChronoDuration;
use shared_types::ErrorKind;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Errors from the time source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    /// No offset could be fetched and no usable cached one exists.
    #[error("clock unavailable: {0}")]
    Unavailable(String),

    /// The network time server could not be reached or answered garbage.
    #[error("ntp query to {server} failed: {reason}")]
    QueryFailed { server: String, reason: String },
}

impl ClockError {
    /// Error kind for reporting.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ClockUnavailable
    }
}

/// Tuning for the offset cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockConfig {
    /// `host:port` of the SNTP server.
    pub ntp_server: String,
    /// A cached offset younger than this is used without a network query.
    pub freshness: Duration,
    /// A cached offset older than this is never used.
    pub hard_expiry: Duration,
    /// Per-query timeout.
    pub query_timeout: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            ntp_server: "pool.ntp.org:123".to_string(),
            freshness: Duration::from_secs(600),
            hard_expiry: Duration::from_secs(3600),
            query_timeout: Duration::from_secs(3),
        }
    }
}

/// Last known `server_time - local_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedOffset {
    pub offset: ChronoDuration,
    pub fetched_at: Instant,
}

/// What `now()` should do with the cache in hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheVerdict {
    /// Fresh; no query needed.
    Fresh(ChronoDuration),
    /// Stale but still usable if the refresh fails.
    Usable(ChronoDuration),
    /// Missing or past hard expiry.
    Expired,
}

impl ClockConfig {
    /// Classify the cache at `now`.
    pub fn judge(&self, cached: Option<CachedOffset>, now: Instant) -> CacheVerdict {
        let Some(cached) = cached else {
            return CacheVerdict::Expired;
        };
        let age = now.saturating_duration_since(cached.fetched_at);
        if age < self.freshness {
            CacheVerdict::Fresh(cached.offset)
        } else if age < self.hard_expiry {
            CacheVerdict::Usable(cached.offset)
        } else {
            CacheVerdict::Expired
        }
    }
}
