//! Versioned blob encoding of `AccountState`.
//!
//! `[schema_version:u8][bincode(AccountState)]`
//!
//! Version 1 blobs predate `sent_bundles` and are upgraded on read.

use super::errors::StoreError;
use super::state::{AccountState, DepositRecord, PendingBundle};
use serde::Deserialize;
use shared_types::{Address, BundleHash};
use std::collections::{BTreeMap, BTreeSet};

pub const SCHEMA_VERSION: u8 = 2;

const SCHEMA_V1: u8 = 1;

#[derive(Deserialize)]
struct StateV1 {
    seed_hash: String,
    next_key_index: u64,
    deposits: BTreeMap<Address, DepositRecord>,
    pending: BTreeMap<BundleHash, PendingBundle>,
    spent_addresses: BTreeSet<Address>,
}

impl From<StateV1> for AccountState {
    fn from(v1: StateV1) -> Self {
        // Bundles already settled under v1 are unknown; pending ones are not.
        let sent_bundles = v1.pending.keys().cloned().collect();
        Self {
            seed_hash: v1.seed_hash,
            next_key_index: v1.next_key_index,
            deposits: v1.deposits,
            pending: v1.pending,
            spent_addresses: v1.spent_addresses,
            sent_bundles,
        }
    }
}

pub fn encode_state(state: &AccountState) -> Result<Vec<u8>, StoreError> {
    let body = bincode::serialize(state).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let mut blob = Vec::with_capacity(body.len() + 1);
    blob.push(SCHEMA_VERSION);
    blob.extend_from_slice(&body);
    Ok(blob)
}

pub fn decode_state(blob: &[u8]) -> Result<AccountState, StoreError> {
    match blob.split_first() {
        Some((&SCHEMA_VERSION, body)) => {
            bincode::deserialize(body).map_err(|e| StoreError::Corrupt(e.to_string()))
        }
        Some((&SCHEMA_V1, body)) => bincode::deserialize::<StateV1>(body)
            .map(AccountState::from)
            .map_err(|e| StoreError::Corrupt(e.to_string())),
        Some((version, _)) => Err(StoreError::Corrupt(format!(
            "unsupported schema version {version}"
        ))),
        None => Err(StoreError::Corrupt("empty blob".into())),
    }
}
