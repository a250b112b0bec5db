//! # Account Store
//!
//! **Subsystem ID:** 3
//!
//! Persists everything an account needs to survive a restart: the next
//! unused key index, handed-out deposit addresses with their conditions,
//! outgoing bundles that have not settled, and spent addresses.
//!
//! ## Guarantees
//!
//! | Operation | Guarantee |
//! |-----------|-----------|
//! | any mutation | whole state rewritten in one atomic batch |
//! | `allocate_key_index` | never returns the same index twice, across restarts |
//! | `mark_spent` | spent addresses are never forgotten |
//! | `record_incoming*` | `true` exactly once per `(address, bundle)` |
//!
//! ## Backends
//!
//! - `InMemoryKVStore`: tests, ephemeral wallets
//! - `FileBackedKVStore`: embedded, one locked data directory
//! - `RocksDbStore`: `rocksdb` feature

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::{DatabaseLock, FileBackedKVStore, InMemoryKVStore, LockError};
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbConfig, RocksDbStore};
pub use domain::{
    AccountState, DepositRecord, KVStoreError, PendingBundle, PendingTail, StoreError, TailKind,
};
pub use ports::{AccountStore, BatchOperation, KeyValueStore};
pub use service::KvAccountStore;
