//! Test utilities for the time source.
//!
//! Enable with the `test-utils` feature flag.

use crate::domain::ClockError;
use crate::ports::{Clock, NtpSource};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A clock whose time is set by the test.
///
/// # Example
///
/// ```rust,ignore
/// use dw_01_time_source::test_utils::ManualClock;
/// use chrono::Duration;
///
/// let clock = ManualClock::at_unix(1_700_000_000);
/// clock.advance(Duration::hours(1));
/// assert_eq!(clock.current().timestamp(), 1_700_003_600);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    unavailable: AtomicBool,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Start at a unix timestamp (seconds).
    pub fn at_unix(seconds: i64) -> Self {
        Self::new(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }

    /// Start at the host's current time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Move time forward (or backward with a negative duration).
    pub fn advance(&self, by: ChronoDuration) {
        *self.now.lock() += by;
    }

    pub fn current(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    /// Make subsequent reads fail with `ClockError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClockError::Unavailable("manual clock switched off".into()));
        }
        Ok(self.current())
    }
}

/// An `NtpSource` that replays queued answers. An empty queue fails.
#[derive(Debug, Default)]
pub struct ScriptedNtp {
    answers: Mutex<VecDeque<Result<ChronoDuration, String>>>,
    calls: AtomicUsize,
}

impl ScriptedNtp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, offset: ChronoDuration) {
        self.answers.lock().push_back(Ok(offset));
    }

    pub fn push_err(&self, reason: &str) {
        self.answers.lock().push_back(Err(reason.to_string()));
    }

    /// Number of queries made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NtpSource for ScriptedNtp {
    async fn offset(&self, server: &str) -> Result<ChronoDuration, ClockError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().pop_front() {
            Some(Ok(offset)) => Ok(offset),
            Some(Err(reason)) => Err(ClockError::QueryFailed {
                server: server.to_string(),
                reason,
            }),
            None => Err(ClockError::QueryFailed {
                server: server.to_string(),
                reason: "no scripted answer".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_can_go_dark() {
        let clock = ManualClock::at_unix(1000);
        assert_eq!(clock.now().await.unwrap().timestamp(), 1000);
        clock.set_unavailable(true);
        assert!(clock.now().await.is_err());
    }
}
