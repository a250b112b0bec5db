//! Domain layer for the quorum client.
//!
//! Pure logic only: settings, errors, wire payloads and the quorum rule.

pub mod errors;
pub mod quorum;
pub mod settings;
pub mod wire;

pub use errors::QuorumError;
pub use quorum::{canonical_hash, evaluate_quorum, NodeAnswer, NodeReply, VOLATILE_FIELDS};
pub use settings::{QuorumSettings, RetryPolicy};
pub use wire::{NodeInfo, Tips};
