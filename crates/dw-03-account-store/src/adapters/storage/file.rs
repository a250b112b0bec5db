use crate::adapters::lock::DatabaseLock;
use crate::domain::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const DATA_FILE: &str = "account.db";

fn io_error(e: impl std::fmt::Display) -> KVStoreError {
    KVStoreError::IOError {
        message: e.to_string(),
    }
}

/// File-backed key-value store for the embedded backend.
///
/// Holds everything in memory and rewrites `<data_dir>/account.db` on every
/// write through a temp file, `fsync` and `rename`, so a reader sees either
/// the old image or the new one. The data directory is locked for the
/// lifetime of the store.
pub struct FileBackedKVStore {
    data: HashMap<Vec<u8>, Vec<u8>>,
    path: PathBuf,
    lock: Option<DatabaseLock>,
}

impl FileBackedKVStore {
    /// Lock `data_dir` and load its data file, if any.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, KVStoreError> {
        let data_dir = data_dir.as_ref();
        let lock = DatabaseLock::acquire(data_dir).map_err(|e| KVStoreError::Locked {
            message: e.to_string(),
        })?;
        let path = data_dir.join(DATA_FILE);

        let data = match std::fs::read(&path) {
            Ok(bytes) => Self::decode(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(io_error(e)),
        };
        info!(
            path = %path.display(),
            keys = data.len(),
            "[dw-03] Opened file-backed store"
        );

        Ok(Self {
            data,
            path,
            lock: Some(lock),
        })
    }

    /// `[key_len:u32][key][value_len:u32][value]...`
    fn decode(bytes: &[u8]) -> Result<HashMap<Vec<u8>, Vec<u8>>, KVStoreError> {
        fn take<'a>(bytes: &'a [u8], cursor: &mut usize, n: usize) -> Result<&'a [u8], KVStoreError> {
            let end = cursor
                .checked_add(n)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| KVStoreError::CorruptionError {
                    message: format!("truncated entry at offset {cursor}"),
                })?;
            let slice = &bytes[*cursor..end];
            *cursor = end;
            Ok(slice)
        }
        fn take_len(bytes: &[u8], cursor: &mut usize) -> Result<usize, KVStoreError> {
            let raw = take(bytes, cursor, 4)?;
            let mut len = [0u8; 4];
            len.copy_from_slice(raw);
            Ok(u32::from_le_bytes(len) as usize)
        }

        let mut data = HashMap::new();
        let mut cursor = 0;
        while cursor < bytes.len() {
            let key_len = take_len(bytes, &mut cursor)?;
            let key = take(bytes, &mut cursor, key_len)?.to_vec();
            let value_len = take_len(bytes, &mut cursor)?;
            let value = take(bytes, &mut cursor, value_len)?.to_vec();
            data.insert(key, value);
        }
        Ok(data)
    }

    fn save_to_file(&self) -> Result<(), KVStoreError> {
        if self.lock.is_none() {
            return Err(io_error("store closed"));
        }

        let mut bytes = Vec::new();
        for (key, value) in &self.data {
            bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
            bytes.extend_from_slice(key);
            bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
            bytes.extend_from_slice(value);
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        std::fs::rename(&temp_path, &self.path).map_err(io_error)
    }

    /// Apply `operations` in memory, persist, and roll back if that fails.
    fn apply(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let snapshot = self.data.clone();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        if let Err(e) = self.save_to_file() {
            self.data = snapshot;
            return Err(e);
        }
        Ok(())
    }
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.apply(operations)
    }

    fn close(&mut self) -> Result<(), KVStoreError> {
        if self.lock.take().is_some() {
            info!(path = %self.path.display(), "[dw-03] Closed file-backed store");
        }
        Ok(())
    }
}
