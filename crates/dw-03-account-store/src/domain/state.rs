//! Persisted account state.
//!
//! All mutations are methods on `AccountState` so the store service only
//! has to load, apply and save under one lock.

use super::errors::StoreError;
use chrono::{DateTime, Utc};
use dw_04_deposit_conditions::DepositConditions;
use serde::{Deserialize, Serialize};
use shared_types::{Address, BundleHash, Transaction, TxHash};
use std::collections::{BTreeMap, BTreeSet};

/// A deposit address handed out by the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub key_index: u64,
    pub conditions: DepositConditions,
    /// Incoming bundles seen on the ledger.
    pub observed_incoming_bundles: BTreeSet<BundleHash>,
    /// Incoming bundles seen confirmed.
    pub confirmed_incoming_bundles: BTreeSet<BundleHash>,
}

impl DepositRecord {
    pub fn new(key_index: u64, conditions: DepositConditions) -> Self {
        Self {
            key_index,
            conditions,
            observed_incoming_bundles: BTreeSet::new(),
            confirmed_incoming_bundles: BTreeSet::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.conditions.address
    }

    /// Observed bundles not yet seen confirmed.
    pub fn unconfirmed_incoming(&self) -> impl Iterator<Item = &BundleHash> {
        self.observed_incoming_bundles
            .difference(&self.confirmed_incoming_bundles)
    }

    /// Whether the poller still has to watch this address at `now`.
    pub fn is_watched(&self, now: DateTime<Utc>) -> bool {
        self.conditions.is_live(now) || self.unconfirmed_incoming().next().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TailKind {
    /// The bundle itself, attached (originally or by reattachment).
    Attachment,
    /// A zero-value promotion approving an attachment.
    Promotion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTail {
    pub hash: TxHash,
    pub kind: TailKind,
    pub at: DateTime<Utc>,
}

/// An outgoing bundle that has not settled yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBundle {
    pub bundle_hash: BundleHash,
    /// Signed transactions of the original attachment; reattachment
    /// republishes these with fresh tips.
    pub transactions: Vec<Transaction>,
    /// First entry is the original attachment.
    pub tails: Vec<PendingTail>,
    pub created_at: DateTime<Utc>,
    pub last_promoted_at: Option<DateTime<Utc>>,
    pub last_reattached_at: Option<DateTime<Utc>>,
    pub confirmed: bool,
}

impl PendingBundle {
    /// Track an attached bundle; `None` when it has no tail.
    pub fn from_attached(transactions: Vec<Transaction>, at: DateTime<Utc>) -> Option<Self> {
        let tail = transactions.iter().find(|tx| tx.is_tail())?;
        Some(Self {
            bundle_hash: tail.bundle.clone(),
            tails: vec![PendingTail {
                hash: tail.hash.clone(),
                kind: TailKind::Attachment,
                at,
            }],
            transactions,
            created_at: at,
            last_promoted_at: None,
            last_reattached_at: None,
            confirmed: false,
        })
    }

    /// Tails whose confirmation confirms the bundle.
    pub fn attachment_tails(&self) -> Vec<TxHash> {
        self.tails
            .iter()
            .filter(|t| t.kind == TailKind::Attachment)
            .map(|t| t.hash.clone())
            .collect()
    }

    /// The attachment promotions should reference.
    pub fn latest_attachment(&self) -> Option<&TxHash> {
        self.tails
            .iter()
            .rev()
            .find(|t| t.kind == TailKind::Attachment)
            .map(|t| &t.hash)
    }

    pub fn latest_tail(&self) -> Option<&PendingTail> {
        self.tails.last()
    }

    /// When the bundle was last touched.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.latest_tail().map_or(self.created_at, |t| t.at)
    }

    /// Input addresses the bundle spends.
    pub fn inputs(&self) -> BTreeSet<Address> {
        self.transactions
            .iter()
            .filter(|tx| tx.value < 0)
            .map(|tx| tx.address.clone())
            .collect()
    }
}

/// Everything the store persists for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub seed_hash: String,
    pub next_key_index: u64,
    pub deposits: BTreeMap<Address, DepositRecord>,
    pub pending: BTreeMap<BundleHash, PendingBundle>,
    /// Never shrinks.
    pub spent_addresses: BTreeSet<Address>,
    /// Every bundle this account has sent. Never shrinks, so outputs of an
    /// own bundle (its change included) are never taken for deposits.
    pub sent_bundles: BTreeSet<BundleHash>,
}

impl AccountState {
    pub fn new(seed_hash: impl Into<String>) -> Self {
        Self {
            seed_hash: seed_hash.into(),
            next_key_index: 0,
            deposits: BTreeMap::new(),
            pending: BTreeMap::new(),
            spent_addresses: BTreeSet::new(),
            sent_bundles: BTreeSet::new(),
        }
    }

    pub fn allocate_key_index(&mut self) -> u64 {
        let index = self.next_key_index;
        self.next_key_index += 1;
        index
    }

    pub fn add_deposit(&mut self, record: DepositRecord) {
        // A record can only name an index that was allocated.
        self.next_key_index = self.next_key_index.max(record.key_index + 1);
        self.deposits.insert(record.address().clone(), record);
    }

    pub fn remove_deposit(&mut self, address: &Address) -> bool {
        self.deposits.remove(address).is_some()
    }

    pub fn add_pending(&mut self, bundle: PendingBundle) {
        self.sent_bundles.insert(bundle.bundle_hash.clone());
        self.pending.insert(bundle.bundle_hash.clone(), bundle);
    }

    pub fn remove_pending(&mut self, bundle_hash: &BundleHash) -> bool {
        self.pending.remove(bundle_hash).is_some()
    }

    pub fn append_tail(
        &mut self,
        bundle_hash: &BundleHash,
        tail: PendingTail,
    ) -> Result<(), StoreError> {
        let bundle = self
            .pending
            .get_mut(bundle_hash)
            .ok_or_else(|| StoreError::UnknownBundle(bundle_hash.clone()))?;
        match tail.kind {
            TailKind::Attachment => bundle.last_reattached_at = Some(tail.at),
            TailKind::Promotion => bundle.last_promoted_at = Some(tail.at),
        }
        bundle.tails.push(tail);
        Ok(())
    }

    /// `true` only for the call that made the transition.
    pub fn mark_confirmed(&mut self, bundle_hash: &BundleHash) -> Result<bool, StoreError> {
        let bundle = self
            .pending
            .get_mut(bundle_hash)
            .ok_or_else(|| StoreError::UnknownBundle(bundle_hash.clone()))?;
        Ok(!std::mem::replace(&mut bundle.confirmed, true))
    }

    pub fn mark_spent(&mut self, address: Address) {
        self.spent_addresses.insert(address);
    }

    pub fn is_spent(&self, address: &Address) -> bool {
        self.spent_addresses.contains(address)
    }

    pub fn is_sent(&self, bundle_hash: &BundleHash) -> bool {
        self.sent_bundles.contains(bundle_hash)
    }

    /// `true` the first time `(address, bundle)` is seen.
    pub fn record_incoming(
        &mut self,
        address: &Address,
        bundle_hash: &BundleHash,
    ) -> Result<bool, StoreError> {
        let record = self
            .deposits
            .get_mut(address)
            .ok_or_else(|| StoreError::UnknownAddress(address.clone()))?;
        Ok(record.observed_incoming_bundles.insert(bundle_hash.clone()))
    }

    /// `true` the first time `(address, bundle)` is seen confirmed.
    pub fn record_incoming_confirmed(
        &mut self,
        address: &Address,
        bundle_hash: &BundleHash,
    ) -> Result<bool, StoreError> {
        let record = self
            .deposits
            .get_mut(address)
            .ok_or_else(|| StoreError::UnknownAddress(address.clone()))?;
        record.observed_incoming_bundles.insert(bundle_hash.clone());
        Ok(record.confirmed_incoming_bundles.insert(bundle_hash.clone()))
    }
}
