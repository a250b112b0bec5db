//! # Time Source
//!
//! **Subsystem ID:** 1
//!
//! Authoritative UTC for deposit expiries and the send oracle. Queries an
//! SNTP server, caches the offset to the local clock for a freshness window,
//! and falls back to a stale offset (reporting `ClockDegraded`) until a hard
//! expiry.
//!
//! ## Architecture
//!
//! - **Domain:** errors, cache policy (`ClockConfig::judge`)
//! - **Ports:** `Clock` (consumed by the account), `NtpSource` (network)
//! - **Service:** `NtpClock`
//! - **Adapters:** `UdpNtpSource`, `SystemClock`

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::{SystemClock, UdpNtpSource};
pub use domain::{ClockConfig, ClockError};
pub use ports::{Clock, NtpSource};
pub use service::NtpClock;
