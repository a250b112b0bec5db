//! # Integration Tests
//!
//! The account driven end to end against the simulated ledger. The
//! fixture's poller and promoter run one tick per call so every test
//! controls exactly when the ledger is observed.

pub mod properties;
pub mod scenarios;
