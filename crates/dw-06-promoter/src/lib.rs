//! # Promoter
//!
//! **Subsystem ID:** 6
//!
//! Background loop that keeps pending outgoing bundles confirmable.
//!
//! | Ledger says | Action | Event |
//! |-------------|--------|-------|
//! | an attachment is included | mark confirmed | `Confirmed` |
//! | latest attachment consistent | zero-value promotion | `Promotion` |
//! | latest attachment inconsistent | reattach on fresh tips | `Reattachment` |
//! | bundle older than `abandon_after` | drop from pending | `InternalError(BundleAbandoned)` |

pub mod domain;
pub mod service;

pub use domain::{Plan, PromoteError, PromoterConfig, PROMOTION_TAG};
pub use service::{Outcome, PromoteReport, Promoter};
