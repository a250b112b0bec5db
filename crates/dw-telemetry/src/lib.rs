//! # Donation Wallet Telemetry
//!
//! Logging and metrics shared by the server and the CLI wallet.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dw_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&TelemetryConfig::for_service("donation-server"))?;
//!     // ...
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DW_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `DW_JSON_LOGS` | `false` | JSON log lines |
//! | `DW_SERVICE_NAME` | `donation-wallet` | Service name in logs |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    gather_metrics, register_metrics, ADDRESSES_ALLOCATED, BUNDLES_CONFIRMED, BUNDLES_PROMOTED,
    BUNDLES_REATTACHED, BUNDLES_SENT, DEPOSITS_RECEIVED, EVENTS_DROPPED, EVENTS_PUBLISHED, NODE_REQUEST_DURATION, POLL_TICKS,
    QUORUM_OUTCOMES, TICK_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
