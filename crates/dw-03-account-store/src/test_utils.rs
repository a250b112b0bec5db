//! Test helpers for code that uses the account store.

use crate::adapters::InMemoryKVStore;
use crate::domain::KVStoreError;
use crate::ports::{BatchOperation, KeyValueStore};
use crate::service::KvAccountStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory backend whose operations fail while its switch is on.
pub struct FlakyKVStore {
    inner: InMemoryKVStore,
    failing: Arc<AtomicBool>,
}

/// Shared switch returned alongside a `FlakyKVStore`.
#[derive(Clone, Default)]
pub struct FailSwitch(Arc<AtomicBool>);

impl FailSwitch {
    pub fn fail(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl FlakyKVStore {
    pub fn new() -> (Self, FailSwitch) {
        let switch = FailSwitch::default();
        (
            Self {
                inner: InMemoryKVStore::new(),
                failing: Arc::clone(&switch.0),
            },
            switch,
        )
    }

    fn check(&self) -> Result<(), KVStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(KVStoreError::IOError {
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl KeyValueStore for FlakyKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.check()?;
        self.inner.get(key)
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.check()?;
        self.inner.atomic_batch_write(operations)
    }
}

/// An account store whose backend can be switched off.
pub fn flaky_store() -> (KvAccountStore<FlakyKVStore>, FailSwitch) {
    let (kv, switch) = FlakyKVStore::new();
    (KvAccountStore::new(kv), switch)
}
