//! Quorum settings.

use super::errors::QuorumError;
use std::time::Duration;

/// Exponential backoff for read retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Ceiling for a single delay.
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Which nodes to ask and how much agreement to demand.
#[derive(Debug, Clone, PartialEq)]
pub struct QuorumSettings {
    /// Node for tips and attachment, and the tie-breaker.
    pub primary: String,
    /// Nodes taking part in quorum reads.
    pub nodes: Vec<String>,
    /// Fraction of usable nodes that must agree, in (0, 1].
    pub threshold: f64,
    /// Fraction of nodes allowed to be missing or stale, in [0, 1).
    pub no_response_tolerance: f64,
    /// Largest milestone lag behind the reference before a node is stale.
    pub max_subtangle_milestone_delta: u64,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Bound on concurrent node requests.
    pub max_in_flight: usize,
}

impl QuorumSettings {
    /// Settings with the usual defaults for everything but the node list.
    pub fn new(primary: impl Into<String>, nodes: Vec<String>) -> Self {
        Self {
            primary: primary.into(),
            nodes,
            threshold: 0.66,
            no_response_tolerance: 0.25,
            max_subtangle_milestone_delta: 1,
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            max_in_flight: 16,
        }
    }

    pub fn validate(&self) -> Result<(), QuorumError> {
        if self.nodes.is_empty() {
            return Err(QuorumError::InvalidSettings("node list is empty".into()));
        }
        if self.primary.is_empty() {
            return Err(QuorumError::InvalidSettings("primary node is empty".into()));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(QuorumError::InvalidSettings(format!(
                "threshold {} outside (0, 1]",
                self.threshold
            )));
        }
        if !(0.0..1.0).contains(&self.no_response_tolerance) {
            return Err(QuorumError::InvalidSettings(format!(
                "no_response_tolerance {} outside [0, 1)",
                self.no_response_tolerance
            )));
        }
        if self.timeout.is_zero() {
            return Err(QuorumError::InvalidSettings("timeout is zero".into()));
        }
        if self.max_in_flight == 0 || self.retry.max_attempts == 0 {
            return Err(QuorumError::InvalidSettings(
                "max_in_flight and retry attempts must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> QuorumSettings {
        QuorumSettings::new("a", vec!["a".into(), "b".into()])
    }

    #[test]
    fn test_validate_bounds() {
        assert!(settings().validate().is_ok());

        let mut s = settings();
        s.threshold = 0.0;
        assert!(s.validate().is_err());
        s.threshold = 1.0;
        assert!(s.validate().is_ok());

        s.no_response_tolerance = 1.0;
        assert!(s.validate().is_err());

        let mut s = settings();
        s.nodes.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(2));
        assert_eq!(policy.delay(10), Duration::from_secs(8));
    }
}
