//! # RocksDB Storage Adapter
//!
//! RocksDB implementation of `KeyValueStore`, enabled with the `rocksdb`
//! feature. Account states live in the default column family; batches map
//! onto a `WriteBatch`, so a crash never leaves a half-written state.

use crate::domain::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use rocksdb::{Options, WriteBatch, WriteOptions, DB};
use std::path::PathBuf;
use tracing::info;

fn io_error(op: &str, e: rocksdb::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: format!("RocksDB {op} failed: {e}"),
    }
}

/// RocksDB configuration.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Block cache size in bytes (default: 32MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 8MB)
    pub write_buffer_size: usize,
    /// Enable fsync after each write (default: true)
    pub sync_writes: bool,
}

impl RocksDbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 32 * 1024 * 1024,
            write_buffer_size: 8 * 1024 * 1024,
            sync_writes: true,
        }
    }

    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            block_cache_size: 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
            ..Self::new(path)
        }
    }
}

/// RocksDB-backed key-value store.
pub struct RocksDbStore {
    db: RwLock<Option<DB>>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create the database at `config.path`.
    pub fn open(config: RocksDbConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| io_error("open", e))?;
        info!(path = %config.path.display(), "[dw-03] Opened RocksDB store");

        Ok(Self {
            db: RwLock::new(Some(db)),
            config,
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&DB) -> Result<T, KVStoreError>,
    ) -> Result<T, KVStoreError> {
        match self.db.read().as_ref() {
            Some(db) => f(db),
            None => Err(KVStoreError::IOError {
                message: "RocksDB store closed".to_string(),
            }),
        }
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.with_db(|db| db.get(key).map_err(|e| io_error("get", e)))
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }
        let write_opts = self.write_options();
        self.with_db(|db| {
            db.write_opt(batch, &write_opts)
                .map_err(|e| io_error("batch write", e))
        })
    }

    fn close(&mut self) -> Result<(), KVStoreError> {
        if let Some(db) = self.db.write().take() {
            db.flush().map_err(|e| io_error("flush", e))?;
            info!(path = %self.config.path.display(), "[dw-03] Closed RocksDB store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = RocksDbStore::open(RocksDbConfig::for_testing(dir.path())).unwrap();
            store
                .atomic_batch_write(vec![
                    BatchOperation::put(b"account:a".to_vec(), b"1".to_vec()),
                    BatchOperation::put(b"account:b".to_vec(), b"2".to_vec()),
                    BatchOperation::put(b"other".to_vec(), b"3".to_vec()),
                ])
                .unwrap();
            store.close().unwrap();
            assert!(store.get(b"account:a").is_err());
        }
        let store = RocksDbStore::open(RocksDbConfig::for_testing(dir.path())).unwrap();
        assert_eq!(store.get(b"account:b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"other").unwrap(), Some(b"3".to_vec()));
    }
}
