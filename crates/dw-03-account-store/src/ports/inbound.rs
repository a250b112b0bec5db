//! Inbound port: the account store contract.

use crate::domain::{AccountState, DepositRecord, PendingBundle, PendingTail, StoreError};
use shared_types::{Address, BundleHash};

/// Persistent account state, keyed by seed hash.
///
/// Every method is atomic: it reads, applies and writes back the whole
/// state under the store's lock, so concurrent loops coordinate through it
/// without further locking.
pub trait AccountStore: Send + Sync {
    /// # Errors
    ///
    /// `NotFound` when nothing was saved for `seed_hash`.
    fn load(&self, seed_hash: &str) -> Result<AccountState, StoreError>;

    /// Replace the saved state. The stored image is never partially written.
    fn save(&self, state: &AccountState) -> Result<(), StoreError>;

    /// Load, or create and save an empty state.
    fn load_or_create(&self, seed_hash: &str) -> Result<AccountState, StoreError>;

    /// Return `next_key_index` and persist its increment.
    fn allocate_key_index(&self, seed_hash: &str) -> Result<u64, StoreError>;

    fn add_deposit(&self, seed_hash: &str, record: DepositRecord) -> Result<(), StoreError>;

    fn remove_deposit(&self, seed_hash: &str, address: &Address) -> Result<bool, StoreError>;

    fn add_pending(&self, seed_hash: &str, bundle: PendingBundle) -> Result<(), StoreError>;

    fn remove_pending(&self, seed_hash: &str, bundle_hash: &BundleHash)
        -> Result<bool, StoreError>;

    fn append_tail(
        &self,
        seed_hash: &str,
        bundle_hash: &BundleHash,
        tail: PendingTail,
    ) -> Result<(), StoreError>;

    /// `true` only for the call that made the transition.
    fn mark_confirmed(&self, seed_hash: &str, bundle_hash: &BundleHash)
        -> Result<bool, StoreError>;

    /// Spent addresses are never removed.
    fn mark_spent(&self, seed_hash: &str, addresses: &[Address]) -> Result<(), StoreError>;

    /// `true` the first time `(address, bundle_hash)` is recorded.
    fn record_incoming(
        &self,
        seed_hash: &str,
        address: &Address,
        bundle_hash: &BundleHash,
    ) -> Result<bool, StoreError>;

    /// `true` the first time `(address, bundle_hash)` is recorded confirmed.
    fn record_incoming_confirmed(
        &self,
        seed_hash: &str,
        address: &Address,
        bundle_hash: &BundleHash,
    ) -> Result<bool, StoreError>;

    fn deposits(&self, seed_hash: &str) -> Result<Vec<DepositRecord>, StoreError> {
        Ok(self.load(seed_hash)?.deposits.into_values().collect())
    }

    fn pending(&self, seed_hash: &str) -> Result<Vec<PendingBundle>, StoreError> {
        Ok(self.load(seed_hash)?.pending.into_values().collect())
    }

    /// Flush and refuse further calls.
    fn close(&self) -> Result<(), StoreError>;
}
