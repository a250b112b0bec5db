//! # NTP Clock Service
//!
//! Wraps an `NtpSource` with the offset cache:
//!
//! | Cache state | Query | Result |
//! |-------------|-------|--------|
//! | fresh (< freshness) | none | local + cached offset |
//! | stale (< hard expiry) | ok | local + new offset |
//! | stale (< hard expiry) | failed | local + cached offset, `ClockDegraded` emitted |
//! | missing / expired | ok | local + new offset |
//! | missing / expired | failed | `ClockUnavailable` |

use crate::domain::{CacheVerdict, CachedOffset, ClockConfig, ClockError};
use crate::ports::{Clock, NtpSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared_bus::{AccountEvent, EventPublisher, InternalError};
use shared_types::ErrorKind;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Network-backed clock with a cached offset.
pub struct NtpClock {
    config: ClockConfig,
    source: Arc<dyn NtpSource>,
    cache: Mutex<Option<CachedOffset>>,
    /// Serializes refreshes so a burst of callers triggers one query.
    refresh: tokio::sync::Mutex<()>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl NtpClock {
    pub fn new(config: ClockConfig, source: Arc<dyn NtpSource>) -> Self {
        Self {
            config,
            source,
            cache: Mutex::new(None),
            refresh: tokio::sync::Mutex::new(()),
            events: None,
        }
    }

    /// Report degraded reads on `events`.
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// The cached offset, if any.
    pub fn cached_offset(&self) -> Option<chrono::Duration> {
        self.cache.lock().map(|c| c.offset)
    }

    fn verdict(&self) -> CacheVerdict {
        self.config.judge(*self.cache.lock(), Instant::now())
    }
}

#[async_trait]
impl Clock for NtpClock {
    async fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        if let CacheVerdict::Fresh(offset) = self.verdict() {
            return Ok(Utc::now() + offset);
        }

        let _refreshing = self.refresh.lock().await;
        // Another caller may have refreshed while we waited.
        let verdict = self.verdict();
        if let CacheVerdict::Fresh(offset) = verdict {
            return Ok(Utc::now() + offset);
        }

        match self.source.offset(&self.config.ntp_server).await {
            Ok(offset) => {
                let previous = self.cache.lock().replace(CachedOffset {
                    offset,
                    fetched_at: Instant::now(),
                });
                if previous.is_none() {
                    info!(
                        server = %self.config.ntp_server,
                        offset_ms = offset.num_milliseconds(),
                        "[dw-01] Clock synchronized"
                    );
                }
                Ok(Utc::now() + offset)
            }
            Err(e) => match verdict {
                CacheVerdict::Usable(offset) => {
                    warn!(error = %e, "[dw-01] NTP refresh failed, using cached offset");
                    if let Some(events) = &self.events {
                        events.publish(AccountEvent::InternalError(
                            InternalError::new(
                                ErrorKind::ClockDegraded,
                                "serving time from a cached offset",
                            )
                            .with_cause(&e),
                        ));
                    }
                    Ok(Utc::now() + offset)
                }
                _ => Err(ClockError::Unavailable(e.to_string())),
            },
        }
    }
}
