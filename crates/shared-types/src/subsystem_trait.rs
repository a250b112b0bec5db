//! # Background Task Contract
//!
//! The account drives its periodic loops (transfer poller, promoter) through
//! this trait. A task only knows how to run ONE tick; scheduling, overrun
//! detection, shutdown draining and error reporting belong to the scheduler.
//!
//! ## Example Implementation
//!
//! ```rust,ignore
//! use shared_types::{BackgroundTask, TaskError};
//! use async_trait::async_trait;
//!
//! pub struct Heartbeat;
//!
//! #[async_trait]
//! impl BackgroundTask for Heartbeat {
//!     fn name(&self) -> &'static str { "heartbeat" }
//!     fn interval(&self) -> Duration { Duration::from_secs(5) }
//!     async fn tick(&self) -> Result<(), TaskError> { Ok(()) }
//! }
//! ```

use crate::errors::ErrorKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Failure of a single tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// Category reported in the `InternalError` event.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Underlying cause, if any.
    pub cause: Option<String>,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {} ({})", self.kind, self.message, cause),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for TaskError {}

/// A periodic unit of work owned by the account.
#[async_trait]
pub trait BackgroundTask: Send + Sync + 'static {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Time between tick starts.
    fn interval(&self) -> Duration;

    /// Run one tick.
    ///
    /// Must not loop forever; the scheduler relies on ticks completing to
    /// honour the shutdown grace period.
    async fn tick(&self) -> Result<(), TaskError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl BackgroundTask for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }

        async fn tick(&self) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_tick_is_object_safe() {
        let task: Box<dyn BackgroundTask> = Box::new(Noop);
        assert_eq!(task.name(), "noop");
        assert!(task.tick().await.is_ok());
    }

    #[test]
    fn test_task_error_display() {
        let err = TaskError::new(ErrorKind::PollFailure, "tick failed").with_cause("timeout");
        let display = err.to_string();
        assert!(display.contains("PollFailure"));
        assert!(display.contains("tick failed"));
        assert!(display.contains("timeout"));
    }
}
