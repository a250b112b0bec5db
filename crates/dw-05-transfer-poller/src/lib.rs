//! # Transfer Poller
//!
//! **Subsystem ID:** 5
//!
//! Background loop that watches deposit addresses for incoming bundles and
//! pending outgoing bundles for confirmation, and publishes the matching
//! lifecycle events exactly once.
//!
//! | Observation | Event |
//! |-------------|-------|
//! | new value bundle on a deposit address | `ReceivingDeposit` |
//! | new zero-value bundle | `ReceivedMessage` |
//! | value bundle included | `ReceivedDeposit` |
//! | outgoing attachment included | `Confirmed` |
//! | `quorum_down_after_ticks` unavailable ticks in a row | `InternalError(QuorumDown)` |
//!
//! Scheduling (overrun skips, shutdown) belongs to the account's scheduler;
//! this crate implements `BackgroundTask::tick`.

pub mod domain;
pub mod service;

pub use domain::{Incoming, PollError, PollerConfig};
pub use service::{PollReport, TransferPoller};
