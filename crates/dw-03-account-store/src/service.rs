//! # Account Store Service
//!
//! `KvAccountStore` implements the `AccountStore` port on top of any
//! `KeyValueStore`. Each account state is one versioned blob under
//! `account:<seed_hash>`; every operation loads it, applies one mutation and
//! writes it back in a single batch while holding the store mutex.

use crate::adapters::{FileBackedKVStore, InMemoryKVStore};
use crate::domain::{
    decode_state, encode_state, AccountState, DepositRecord, PendingBundle, PendingTail,
    StoreError,
};
use crate::ports::{AccountStore, BatchOperation, KeyValueStore};
use parking_lot::Mutex;
use shared_types::{Address, BundleHash};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

const KEY_PREFIX: &[u8] = b"account:";

fn state_key(seed_hash: &str) -> Vec<u8> {
    let mut key = KEY_PREFIX.to_vec();
    key.extend_from_slice(seed_hash.as_bytes());
    key
}

/// Account store over a key-value backend.
pub struct KvAccountStore<S: KeyValueStore> {
    kv: Mutex<S>,
    closed: AtomicBool,
}

impl KvAccountStore<InMemoryKVStore> {
    /// Ephemeral store; nothing survives the process.
    pub fn in_memory() -> Self {
        Self::new(InMemoryKVStore::new())
    }
}

impl KvAccountStore<FileBackedKVStore> {
    /// Embedded store in `data_dir`, locked against other processes.
    pub fn file<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        Ok(Self::new(FileBackedKVStore::open(data_dir)?))
    }
}

impl<S: KeyValueStore> KvAccountStore<S> {
    pub fn new(kv: S) -> Self {
        Self {
            kv: Mutex::new(kv),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("store closed".into()));
        }
        Ok(())
    }

    fn read(kv: &S, seed_hash: &str) -> Result<Option<AccountState>, StoreError> {
        kv.get(&state_key(seed_hash))?
            .map(|blob| decode_state(&blob))
            .transpose()
    }

    fn write(kv: &mut S, state: &AccountState) -> Result<(), StoreError> {
        let blob = encode_state(state)?;
        kv.atomic_batch_write(vec![BatchOperation::put(state_key(&state.seed_hash), blob)])?;
        Ok(())
    }

    /// Load, apply `f`, and save if `f` succeeded.
    fn mutate<T>(
        &self,
        seed_hash: &str,
        f: impl FnOnce(&mut AccountState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut kv = self.kv.lock();
        self.ensure_open()?;
        let mut state = Self::read(&kv, seed_hash)?
            .ok_or_else(|| StoreError::NotFound(seed_hash.to_string()))?;
        let out = f(&mut state)?;
        Self::write(&mut kv, &state)?;
        Ok(out)
    }
}

impl<S: KeyValueStore> AccountStore for KvAccountStore<S> {
    fn load(&self, seed_hash: &str) -> Result<AccountState, StoreError> {
        let kv = self.kv.lock();
        self.ensure_open()?;
        Self::read(&kv, seed_hash)?.ok_or_else(|| StoreError::NotFound(seed_hash.to_string()))
    }

    fn save(&self, state: &AccountState) -> Result<(), StoreError> {
        let mut kv = self.kv.lock();
        self.ensure_open()?;
        Self::write(&mut kv, state)
    }

    fn load_or_create(&self, seed_hash: &str) -> Result<AccountState, StoreError> {
        let mut kv = self.kv.lock();
        self.ensure_open()?;
        if let Some(state) = Self::read(&kv, seed_hash)? {
            return Ok(state);
        }
        let state = AccountState::new(seed_hash);
        Self::write(&mut kv, &state)?;
        info!("[dw-03] Created account state");
        Ok(state)
    }

    fn allocate_key_index(&self, seed_hash: &str) -> Result<u64, StoreError> {
        let index = self.mutate(seed_hash, |state| Ok(state.allocate_key_index()))?;
        debug!(key_index = index, "[dw-03] Allocated key index");
        Ok(index)
    }

    fn add_deposit(&self, seed_hash: &str, record: DepositRecord) -> Result<(), StoreError> {
        self.mutate(seed_hash, |state| {
            state.add_deposit(record);
            Ok(())
        })
    }

    fn remove_deposit(&self, seed_hash: &str, address: &Address) -> Result<bool, StoreError> {
        self.mutate(seed_hash, |state| Ok(state.remove_deposit(address)))
    }

    fn add_pending(&self, seed_hash: &str, bundle: PendingBundle) -> Result<(), StoreError> {
        self.mutate(seed_hash, |state| {
            state.add_pending(bundle);
            Ok(())
        })
    }

    fn remove_pending(
        &self,
        seed_hash: &str,
        bundle_hash: &BundleHash,
    ) -> Result<bool, StoreError> {
        self.mutate(seed_hash, |state| Ok(state.remove_pending(bundle_hash)))
    }

    fn append_tail(
        &self,
        seed_hash: &str,
        bundle_hash: &BundleHash,
        tail: PendingTail,
    ) -> Result<(), StoreError> {
        self.mutate(seed_hash, |state| state.append_tail(bundle_hash, tail))
    }

    fn mark_confirmed(
        &self,
        seed_hash: &str,
        bundle_hash: &BundleHash,
    ) -> Result<bool, StoreError> {
        self.mutate(seed_hash, |state| state.mark_confirmed(bundle_hash))
    }

    fn mark_spent(&self, seed_hash: &str, addresses: &[Address]) -> Result<(), StoreError> {
        self.mutate(seed_hash, |state| {
            for address in addresses {
                state.mark_spent(address.clone());
            }
            Ok(())
        })
    }

    fn record_incoming(
        &self,
        seed_hash: &str,
        address: &Address,
        bundle_hash: &BundleHash,
    ) -> Result<bool, StoreError> {
        self.mutate(seed_hash, |state| state.record_incoming(address, bundle_hash))
    }

    fn record_incoming_confirmed(
        &self,
        seed_hash: &str,
        address: &Address,
        bundle_hash: &BundleHash,
    ) -> Result<bool, StoreError> {
        self.mutate(seed_hash, |state| {
            state.record_incoming_confirmed(address, bundle_hash)
        })
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut kv = self.kv.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        kv.close()?;
        info!("[dw-03] Account store closed");
        Ok(())
    }
}
