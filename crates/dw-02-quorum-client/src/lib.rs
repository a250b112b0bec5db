//! # Quorum Client
//!
//! **Subsystem ID:** 2
//!
//! Reads the ledger through several nodes at once and accepts an answer only
//! when enough of them agree. Writes go to the primary (tips, attachment) or
//! to every node (broadcast).
//!
//! ## Quorum Rule
//!
//! | Step | Check | Failure |
//! |------|-------|---------|
//! | 1 | node answered within the timeout | counted as missing |
//! | 2 | node's solid milestone within `max_subtangle_milestone_delta` of the primary's | counted as missing |
//! | 3 | missing share <= `no_response_tolerance` | `QuorumUnavailable` |
//! | 4 | largest agreeing group >= `threshold` of usable nodes | `QuorumDisagreement` |
//!
//! ## Architecture
//!
//! - **Domain:** settings, errors, wire payloads, `evaluate_quorum`
//! - **Ports:** `LedgerApi` (consumed by the account engine), `NodeTransport`
//! - **Service:** `QuorumClient`
//! - **Adapters:** `HttpTransport` (reqwest)

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::HttpTransport;
pub use domain::{NodeInfo, QuorumError, QuorumSettings, RetryPolicy, Tips};
pub use ports::{LedgerApi, NodeTransport};
pub use service::QuorumClient;
