//! Local system clock.

use crate::domain::ClockError;
use crate::ports::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// The host clock, unchecked. For tools and tests that do not need an
/// authoritative time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        Ok(Utc::now())
    }
}
