//! # Deposit Conditions
//!
//! **Subsystem ID:** 4
//!
//! A conditional deposit address (CDA) is an address plus an expiry and a
//! use policy. It travels in two encodings:
//!
//! - **Magnet link:** `iota://<ADDRESS>/?t=<unix_seconds>&m=<0|1>[&am=<u64>]`
//! - **Opaque record:** a versioned JSON record for `<data_dir>/current`
//!   that carries unknown fields through a round-trip untouched
//!
//! ## Invariants
//!
//! | Rule | Check |
//! |------|-------|
//! | Use policy | exactly one of `multi_use` or `expected_amount` |
//! | Amount | `expected_amount > 0` |
//! | Precision | `timeout_at` has whole seconds |

pub mod conditions;
pub mod errors;
pub mod magnet;
pub mod record;

pub use conditions::{Conditions, DepositConditions};
pub use errors::ConditionsError;
pub use record::ConditionsRecord;
