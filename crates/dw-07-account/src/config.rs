//! # Wallet Configuration
//!
//! The JSON file shared by the server and the CLI wallet. Field names are
//! explicit; only the fields listed under "Optional" carry defaults.
//!
//! ## Optional fields
//!
//! | Field | Default |
//! |-------|---------|
//! | `abandon_after_hours` | 24 |
//! | `shutdown_grace_secs` | 30 |
//! | `send_margin_hours` | 5 |
//! | `quorum_down_after_ticks` | 3 |
//! | `event_channel_capacity` | 64 |
//! | `quorum.retry_max_attempts` | 3 |
//! | `quorum.retry_max_delay_secs` | 8 |
//! | `quorum.max_in_flight` | 16 |
//! | `time.freshness_secs` | 600 |
//! | `time.hard_expiry_secs` | 3600 |
//!
//! `data_dir` or `mongodb` must be present; `data_dir` wins when both are.

use dw_01_time_source::ClockConfig;
use dw_02_quorum_client::{QuorumSettings, RetryPolicy};
use dw_05_transfer_poller::PollerConfig;
use dw_06_promoter::PromoterConfig;
use serde::Deserialize;
use shared_types::SecurityLevel;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One month; larger margins would refuse every link.
const MAX_SEND_MARGIN_HOURS: u64 = 24 * 30;

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(reason.into())
}

/// Quorum section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuorumConfig {
    pub primary_node: String,
    pub nodes: Vec<String>,
    pub threshold: f64,
    pub no_response_tolerance: f64,
    pub max_subtangle_milestone_delta: u64,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_max_delay_secs")]
    pub retry_max_delay_secs: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

/// Time section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimeConfig {
    pub ntp_server: String,
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
    #[serde(default = "default_hard_expiry_secs")]
    pub hard_expiry_secs: u64,
}

/// Remote document store section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub dbname: String,
    pub collname: String,
}

/// Where account state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend<'a> {
    Embedded(&'a Path),
    Mongo(&'a MongoConfig),
}

/// Complete wallet configuration.
#[derive(Clone, Deserialize)]
pub struct WalletConfig {
    pub seed: String,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub mongodb: Option<MongoConfig>,
    pub quorum: QuorumConfig,
    pub mwm: u64,
    pub gtta_depth: u64,
    pub security_level: u8,
    /// Seconds between transfer poller ticks.
    pub transfer_poll_interval: u64,
    /// Seconds between promoter ticks.
    pub promote_reattach_interval: u64,
    pub address_validity_timeout_days: u64,
    pub time: TimeConfig,

    #[serde(default = "default_abandon_after_hours")]
    pub abandon_after_hours: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    #[serde(default = "default_send_margin_hours")]
    pub send_margin_hours: u64,
    #[serde(default = "default_quorum_down_after_ticks")]
    pub quorum_down_after_ticks: u32,
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_max_delay_secs() -> u64 {
    8
}

fn default_max_in_flight() -> usize {
    16
}

fn default_freshness_secs() -> u64 {
    600
}

fn default_hard_expiry_secs() -> u64 {
    3600
}

fn default_abandon_after_hours() -> u64 {
    24
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_send_margin_hours() -> u64 {
    5
}

fn default_quorum_down_after_ticks() -> u32 {
    3
}

fn default_event_channel_capacity() -> usize {
    64
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("seed", &"<redacted>")
            .field("data_dir", &self.data_dir)
            .field("mongodb", &self.mongodb)
            .field("quorum", &self.quorum)
            .field("mwm", &self.mwm)
            .field("gtta_depth", &self.gtta_depth)
            .field("security_level", &self.security_level)
            .field("transfer_poll_interval", &self.transfer_poll_interval)
            .field("promote_reattach_interval", &self.promote_reattach_interval)
            .field(
                "address_validity_timeout_days",
                &self.address_validity_timeout_days,
            )
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

impl WalletConfig {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: WalletConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every bound the account relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seed.is_empty() {
            return Err(invalid("seed is empty"));
        }
        if self.data_dir.is_none() && self.mongodb.is_none() {
            return Err(invalid("either data_dir or mongodb is required"));
        }
        if let Some(mongo) = &self.mongodb {
            if mongo.uri.is_empty() || mongo.dbname.is_empty() || mongo.collname.is_empty() {
                return Err(invalid("mongodb.uri, dbname and collname must be set"));
            }
        }
        self.security()?;
        if self.transfer_poll_interval == 0 || self.promote_reattach_interval == 0 {
            return Err(invalid("poll intervals must be positive"));
        }
        if self.address_validity_timeout_days == 0 {
            return Err(invalid("address_validity_timeout_days must be positive"));
        }
        if self.abandon_after_hours == 0 {
            return Err(invalid("abandon_after_hours must be positive"));
        }
        if self.send_margin_hours > MAX_SEND_MARGIN_HOURS {
            return Err(invalid(format!(
                "send_margin_hours must be at most {MAX_SEND_MARGIN_HOURS}"
            )));
        }
        if self.time.ntp_server.is_empty() {
            return Err(invalid("time.ntp_server is empty"));
        }
        if self.time.freshness_secs > self.time.hard_expiry_secs {
            return Err(invalid("time.freshness_secs exceeds time.hard_expiry_secs"));
        }
        self.quorum_settings()
            .validate()
            .map_err(|e| invalid(e.to_string()))
    }

    pub fn security(&self) -> Result<SecurityLevel, ConfigError> {
        SecurityLevel::new(self.security_level).ok_or_else(|| {
            invalid(format!(
                "security_level must be 1, 2 or 3, got {}",
                self.security_level
            ))
        })
    }

    pub fn store_backend(&self) -> Option<StoreBackend<'_>> {
        match (&self.data_dir, &self.mongodb) {
            (Some(dir), _) => Some(StoreBackend::Embedded(dir)),
            (None, Some(mongo)) => Some(StoreBackend::Mongo(mongo)),
            (None, None) => None,
        }
    }

    pub fn quorum_settings(&self) -> QuorumSettings {
        let q = &self.quorum;
        QuorumSettings {
            primary: q.primary_node.clone(),
            nodes: q.nodes.clone(),
            threshold: q.threshold,
            no_response_tolerance: q.no_response_tolerance,
            max_subtangle_milestone_delta: q.max_subtangle_milestone_delta,
            timeout: Duration::from_secs(q.timeout),
            retry: RetryPolicy {
                max_attempts: q.retry_max_attempts,
                max_delay: Duration::from_secs(q.retry_max_delay_secs),
                ..RetryPolicy::default()
            },
            max_in_flight: q.max_in_flight,
        }
    }

    pub fn clock_config(&self) -> ClockConfig {
        ClockConfig {
            ntp_server: self.time.ntp_server.clone(),
            freshness: Duration::from_secs(self.time.freshness_secs),
            hard_expiry: Duration::from_secs(self.time.hard_expiry_secs),
            ..ClockConfig::default()
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.transfer_poll_interval),
            quorum_down_after_ticks: self.quorum_down_after_ticks,
        }
    }

    pub fn promoter_config(&self) -> PromoterConfig {
        PromoterConfig {
            interval: Duration::from_secs(self.promote_reattach_interval),
            depth: self.gtta_depth,
            mwm: self.mwm,
            abandon_after: Duration::from_secs(self.abandon_after_hours * 3600),
        }
    }

    /// Settings for the account facade itself.
    pub fn account_settings(&self) -> AccountSettings {
        AccountSettings {
            poller: self.poller_config(),
            promoter: self.promoter_config(),
            address_validity: chrono::Duration::days(
                i64::try_from(self.address_validity_timeout_days).unwrap_or(i64::MAX / 86_400),
            ),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        }
    }
}

/// Tuning of the account facade and its loops.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSettings {
    pub poller: PollerConfig,
    pub promoter: PromoterConfig,
    /// Lifetime of internally allocated (change) deposit addresses.
    pub address_validity: chrono::Duration,
    /// How long `shutdown` waits for in-flight ticks and operations.
    pub shutdown_grace: Duration,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            poller: PollerConfig::default(),
            promoter: PromoterConfig::default(),
            address_validity: chrono::Duration::days(7),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "seed": "DONATIONSEED",
        "data_dir": "./data",
        "quorum": {
            "primary_node": "http://a:14265",
            "nodes": ["http://a:14265", "http://b:14265", "http://c:14265"],
            "threshold": 0.66,
            "no_response_tolerance": 0.25,
            "max_subtangle_milestone_delta": 1,
            "timeout": 10
        },
        "mwm": 14,
        "gtta_depth": 3,
        "security_level": 2,
        "transfer_poll_interval": 30,
        "promote_reattach_interval": 30,
        "address_validity_timeout_days": 7,
        "time": { "ntp_server": "time.google.com:123" }
    }"#;

    fn edit(f: impl FnOnce(&mut serde_json::Value)) -> String {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        f(&mut value);
        value.to_string()
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let config = WalletConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.abandon_after_hours, 24);
        assert_eq!(config.shutdown_grace_secs, 30);
        assert_eq!(config.send_margin_hours, 5);
        assert_eq!(config.quorum_down_after_ticks, 3);
        assert_eq!(config.event_channel_capacity, 64);
        assert_eq!(config.quorum.retry_max_attempts, 3);
        assert_eq!(config.quorum.max_in_flight, 16);
        assert_eq!(config.time.freshness_secs, 600);

        let settings = config.account_settings();
        assert_eq!(settings.promoter.abandon_after, Duration::from_secs(86_400));
        assert_eq!(settings.poller.interval, Duration::from_secs(30));
        assert_eq!(settings.address_validity, chrono::Duration::days(7));
        assert_eq!(config.quorum_settings().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_required_field_is_a_parse_error() {
        let text = edit(|v| {
            v.as_object_mut().unwrap().remove("mwm");
        });
        assert!(matches!(
            WalletConfig::from_json(&text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_bounds_rejected() {
        let cases = [
            edit(|v| v["seed"] = "".into()),
            edit(|v| v["security_level"] = 4.into()),
            edit(|v| v["quorum"]["threshold"] = 1.5.into()),
            edit(|v| v["quorum"]["no_response_tolerance"] = 1.0.into()),
            edit(|v| v["quorum"]["nodes"] = serde_json::json!([])),
            edit(|v| v["transfer_poll_interval"] = 0.into()),
            edit(|v| {
                v.as_object_mut().unwrap().remove("data_dir");
            }),
        ];
        for text in cases {
            assert!(
                matches!(WalletConfig::from_json(&text), Err(ConfigError::Invalid(_))),
                "accepted {text}"
            );
        }
    }

    #[test]
    fn test_mongodb_backend_selected_without_data_dir() {
        let text = edit(|v| {
            let obj = v.as_object_mut().unwrap();
            obj.remove("data_dir");
            obj.insert(
                "mongodb".into(),
                serde_json::json!({"uri": "mongodb://x", "dbname": "dw", "collname": "accounts"}),
            );
        });
        let config = WalletConfig::from_json(&text).unwrap();
        assert!(matches!(config.store_backend(), Some(StoreBackend::Mongo(_))));
    }

    #[test]
    fn test_debug_redacts_seed() {
        let config = WalletConfig::from_json(SAMPLE).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("DONATIONSEED"));
        assert!(debug.contains("<redacted>"));
    }
}
