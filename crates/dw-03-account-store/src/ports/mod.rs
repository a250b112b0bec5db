//! Ports for the account store.
//!
//! - `inbound`: the `AccountStore` contract the account engine uses
//! - `outbound`: the `KeyValueStore` backends implement

pub mod inbound;
pub mod outbound;

pub use inbound::AccountStore;
pub use outbound::{BatchOperation, KeyValueStore};
