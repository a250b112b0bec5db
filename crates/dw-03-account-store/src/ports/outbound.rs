//! Outbound port: key-value backends.

use crate::domain::KVStoreError;

/// Byte-level backend behind `KvAccountStore`. Each account state is one
/// value; every change goes through an atomic batch.
///
/// Implemented by `InMemoryKVStore`, `FileBackedKVStore` and, with the
/// `rocksdb` feature, `RocksDbStore`.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either all operations in the batch are applied, or none are; a reader
    /// never observes a partial batch, including after a crash.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Flush and release resources. Later calls may fail.
    fn close(&mut self) -> Result<(), KVStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}
