//! Domain layer for the account store.

pub mod codec;
pub mod errors;
pub mod state;

pub use codec::{decode_state, encode_state, SCHEMA_VERSION};
pub use errors::{KVStoreError, StoreError};
pub use state::{AccountState, DepositRecord, PendingBundle, PendingTail, TailKind};
