//! Adapters for the account store.

pub mod lock;
pub mod storage;

pub use lock::{DatabaseLock, LockError};
#[cfg(feature = "rocksdb")]
pub use storage::{RocksDbConfig, RocksDbStore};
pub use storage::{FileBackedKVStore, InMemoryKVStore};
