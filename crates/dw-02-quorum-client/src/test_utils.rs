//! Test utilities for the quorum client.
//!
//! Enable with the `test-utils` feature flag.
//!
//! - `ScriptedTransport`: per-node canned answers for exercising the quorum rule
//! - `SimulatedLedger`: an in-memory ledger implementing `LedgerApi`

use crate::domain::wire::{command_of, GET_NODE_INFO};
use crate::domain::{NodeInfo, QuorumError, Tips};
use crate::ports::{LedgerApi, NodeTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_crypto::{attach, derive_address, BundleBuilder, InputSpec, OutputSpec, Seed, TryteSponge};
use shared_types::{
    value_to, Address, BundleHash, SecurityLevel, Transaction, TxHash, HASH_TRYTES,
};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// =============================================================================
// SCRIPTED TRANSPORT
// =============================================================================

/// How a scripted node answers every command but `getNodeInfo`.
#[derive(Debug, Clone)]
pub enum NodeBehaviour {
    Reply(Value),
    /// Error body.
    Reject(String),
    /// Transport failure.
    Fail(String),
    /// Never answers.
    Hang,
}

/// Transport whose nodes answer from a script.
///
/// `getNodeInfo` is answered with the node's milestone (100 unless set)
/// unless the node hangs or fails.
#[derive(Default)]
pub struct ScriptedTransport {
    behaviours: Mutex<HashMap<String, NodeBehaviour>>,
    milestones: Mutex<HashMap<String, u64>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, node: &str, behaviour: NodeBehaviour) {
        self.behaviours.lock().insert(node.to_string(), behaviour);
    }

    pub fn set_milestone(&self, node: &str, milestone: u64) {
        self.milestones.lock().insert(node.to_string(), milestone);
    }

    /// Requests received for `command`, across nodes.
    pub fn calls_for(&self, command: &str) -> usize {
        self.calls.lock().get(command).copied().unwrap_or(0)
    }
}

#[async_trait]
impl NodeTransport for ScriptedTransport {
    async fn call(&self, node: &str, request: &Value) -> Result<Value, QuorumError> {
        let command = command_of(request).to_string();
        *self.calls.lock().entry(command.clone()).or_default() += 1;

        let behaviour = self
            .behaviours
            .lock()
            .get(node)
            .cloned()
            .unwrap_or_else(|| NodeBehaviour::Fail("unscripted node".into()));
        let behaviour = match behaviour {
            NodeBehaviour::Reply(_) | NodeBehaviour::Reject(_) if command == GET_NODE_INFO => {
                let milestone = self.milestones.lock().get(node).copied().unwrap_or(100);
                NodeBehaviour::Reply(json!({
                    "appName": "scripted",
                    "latestMilestoneIndex": milestone,
                    "latestSolidSubtangleMilestoneIndex": milestone,
                }))
            }
            other => other,
        };

        match behaviour {
            NodeBehaviour::Reply(body) => Ok(body),
            NodeBehaviour::Reject(reason) => Err(QuorumError::Rejected {
                node: node.to_string(),
                reason,
            }),
            NodeBehaviour::Fail(reason) => Err(QuorumError::Node {
                node: node.to_string(),
                reason,
            }),
            NodeBehaviour::Hang => std::future::pending().await,
        }
    }
}

// =============================================================================
// SIMULATED LEDGER
// =============================================================================

const SIMULATED_NODE: &str = "simulated";
const FUNDER_SEED: &str = "SIMULATEDFUNDER";

#[derive(Default)]
struct LedgerState {
    txs: HashMap<TxHash, Transaction>,
    /// Transaction hashes per address, in arrival order.
    by_address: HashMap<Address, Vec<TxHash>>,
    /// Essence of every bundle, from its first attachment.
    bundles: HashMap<BundleHash, Vec<Transaction>>,
    /// Every transaction of every confirmed attachment.
    confirmed_txs: HashSet<TxHash>,
    confirmed_bundles: HashSet<BundleHash>,
    inconsistent: HashSet<TxHash>,
    genesis: HashMap<Address, u64>,
    broadcasts: Vec<Vec<Transaction>>,
    read_failure: Option<QuorumError>,
    write_failure: Option<QuorumError>,
    read_delay: Option<Duration>,
    reads: usize,
    counter: u64,
    milestone: u64,
}

impl LedgerState {
    fn store(&mut self, txs: &[Transaction]) {
        for tx in txs {
            if self.txs.contains_key(&tx.hash) {
                continue;
            }
            self.by_address
                .entry(tx.address.clone())
                .or_default()
                .push(tx.hash.clone());
            self.txs.insert(tx.hash.clone(), tx.clone());
        }
        if let Some(first) = txs.first() {
            self.bundles.entry(first.bundle.clone()).or_insert_with(|| {
                let mut essence = txs.to_vec();
                essence.sort_by_key(|tx| tx.current_index);
                essence
            });
        }
    }

    /// Confirm the attachment starting at `tail` by walking its trunk chain.
    fn confirm_attachment(&mut self, tail: &TxHash) -> Option<BundleHash> {
        let bundle = self.txs.get(tail)?.bundle.clone();
        let mut next = Some(tail.clone());
        while let Some(hash) = next.take() {
            let Some(tx) = self.txs.get(&hash) else {
                break;
            };
            if tx.bundle != bundle {
                break;
            }
            if tx.current_index < tx.last_index {
                next = Some(tx.trunk.clone());
            }
            self.confirmed_txs.insert(hash);
        }
        Some(bundle)
    }

    fn next_tip(&mut self) -> TxHash {
        self.counter += 1;
        let mut sponge = TryteSponge::with_domain("dw/simulated-tip");
        sponge.absorb(&self.counter.to_le_bytes());
        TxHash::from_trusted(sponge.squeeze_trytes(HASH_TRYTES))
    }

    fn balance(&self, address: &Address) -> u64 {
        let genesis = self.genesis.get(address).copied().unwrap_or(0) as i64;
        let moved: i64 = self
            .confirmed_bundles
            .iter()
            .filter_map(|bundle| self.bundles.get(bundle))
            .map(|essence| value_to(essence, address))
            .sum();
        (genesis + moved).max(0) as u64
    }
}

/// In-memory ledger for tests.
///
/// Bundles only count towards balances once confirmed. Confirmation,
/// consistency and failures are driven by the test.
pub struct SimulatedLedger {
    state: Mutex<LedgerState>,
    funder: Seed,
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                milestone: 1,
                ..LedgerState::default()
            }),
            funder: Seed::new(FUNDER_SEED).expect("funder seed is valid"),
        }
    }

    /// Give `address` a confirmed balance without a bundle.
    pub fn credit(&self, address: &Address, amount: u64) {
        *self.state.lock().genesis.entry(address.clone()).or_default() += amount;
    }

    /// Confirmed balance of `address`.
    pub fn balance(&self, address: &Address) -> u64 {
        self.state.lock().balance(address)
    }

    /// Attach an unconfirmed transfer of `value` into `address`.
    pub fn inject_transfer(&self, address: &Address, value: u64) -> Vec<Transaction> {
        self.inject(&[(address.clone(), value)], None)
    }

    /// Attach one unconfirmed bundle paying every `(address, value)` in
    /// order; only the first output sits on the tail.
    pub fn inject_payout(&self, outputs: &[(Address, u64)]) -> Vec<Transaction> {
        self.inject(outputs, None)
    }

    /// Attach an unconfirmed zero-value message to `address`.
    pub fn inject_message(&self, address: &Address, message: &str) -> Vec<Transaction> {
        self.inject(&[(address.clone(), 0)], Some(message.to_string()))
    }

    fn inject(&self, outputs: &[(Address, u64)], message: Option<String>) -> Vec<Transaction> {
        let mut state = self.state.lock();
        state.counter += 1;
        let counter = state.counter;
        let timestamp = unix_now() + counter;

        let mut builder = BundleBuilder::new(timestamp);
        for (address, value) in outputs {
            builder.add_output(OutputSpec {
                address: address.clone(),
                value: *value,
                tag: shared_crypto::DEFAULT_TAG.into(),
                message: message.clone(),
            });
        }
        let value: u64 = outputs.iter().map(|(_, value)| value).sum();
        if value > 0 {
            let security = SecurityLevel::DEFAULT;
            builder.add_input(InputSpec {
                address: derive_address(&self.funder, counter, security),
                balance: value,
                key_index: counter,
                security,
            });
        }
        let built = builder
            .build(&self.funder)
            .expect("simulated bundle is balanced");
        let (trunk, branch) = (state.next_tip(), state.next_tip());
        let attached = attach(&trunk, &branch, 0, &built)
            .expect("simulated bundle is well formed");
        state.store(&attached);
        attached
    }

    /// Confirm every attachment of `bundle` seen so far.
    pub fn confirm_bundle(&self, bundle: &BundleHash) {
        let mut state = self.state.lock();
        let tails: Vec<TxHash> = state
            .txs
            .values()
            .filter(|tx| &tx.bundle == bundle && tx.is_tail())
            .map(|tx| tx.hash.clone())
            .collect();
        for tail in &tails {
            state.confirm_attachment(tail);
        }
        state.confirmed_bundles.insert(bundle.clone());
        state.milestone += 1;
    }

    /// Confirm the bundle `tail` belongs to, through that attachment only.
    pub fn confirm_tail(&self, tail: &TxHash) {
        let mut state = self.state.lock();
        if let Some(bundle) = state.confirm_attachment(tail) {
            state.confirmed_bundles.insert(bundle);
            state.milestone += 1;
        }
    }

    /// Mark a tail as (in)consistent for `check_consistency`.
    pub fn set_consistent(&self, tail: &TxHash, consistent: bool) {
        let mut state = self.state.lock();
        if consistent {
            state.inconsistent.remove(tail);
        } else {
            state.inconsistent.insert(tail.clone());
        }
    }

    /// Fail every read with `error` until cleared with `None`.
    pub fn set_read_failure(&self, error: Option<QuorumError>) {
        self.state.lock().read_failure = error;
    }

    /// Fail every tips, attach and broadcast call with `error` until cleared.
    pub fn set_write_failure(&self, error: Option<QuorumError>) {
        self.state.lock().write_failure = error;
    }

    /// Delay every read by `delay`.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.state.lock().read_delay = delay;
    }

    /// Bundles broadcast through `broadcast_and_store`, in order.
    pub fn broadcasts(&self) -> Vec<Vec<Transaction>> {
        self.state.lock().broadcasts.clone()
    }

    /// Tail hashes of every stored attachment of `bundle`.
    pub fn tails_of(&self, bundle: &BundleHash) -> Vec<TxHash> {
        self.state
            .lock()
            .txs
            .values()
            .filter(|tx| &tx.bundle == bundle && tx.is_tail())
            .map(|tx| tx.hash.clone())
            .collect()
    }

    /// Stored transaction by hash.
    pub fn transaction(&self, hash: &TxHash) -> Option<Transaction> {
        self.state.lock().txs.get(hash).cloned()
    }

    /// Number of read calls served.
    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    async fn begin_read(&self) -> Result<(), QuorumError> {
        let delay = {
            let mut state = self.state.lock();
            state.reads += 1;
            if let Some(error) = &state.read_failure {
                return Err(error.clone());
            }
            state.read_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn begin_write(&self) -> Result<(), QuorumError> {
        match &self.state.lock().write_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl LedgerApi for SimulatedLedger {
    async fn node_info(&self) -> Result<NodeInfo, QuorumError> {
        let milestone = self.state.lock().milestone;
        Ok(NodeInfo {
            app_name: "simulated".into(),
            app_version: env!("CARGO_PKG_VERSION").into(),
            latest_milestone_index: milestone,
            latest_solid_subtangle_milestone_index: milestone,
        })
    }

    async fn find_transactions(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Transaction>, QuorumError> {
        self.begin_read().await?;
        let state = self.state.lock();
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for address in addresses {
            for hash in state.by_address.get(address).into_iter().flatten() {
                if seen.insert(hash.clone()) {
                    if let Some(tx) = state.txs.get(hash) {
                        found.push(tx.clone());
                    }
                }
            }
        }
        Ok(found)
    }

    async fn get_balances(&self, addresses: &[Address]) -> Result<Vec<u64>, QuorumError> {
        self.begin_read().await?;
        let state = self.state.lock();
        Ok(addresses.iter().map(|a| state.balance(a)).collect())
    }

    async fn get_inclusion_states(&self, tails: &[TxHash]) -> Result<Vec<bool>, QuorumError> {
        self.begin_read().await?;
        let state = self.state.lock();
        Ok(tails
            .iter()
            .map(|t| state.confirmed_txs.contains(t))
            .collect())
    }

    async fn check_consistency(&self, tails: &[TxHash]) -> Result<bool, QuorumError> {
        self.begin_read().await?;
        let state = self.state.lock();
        Ok(tails
            .iter()
            .all(|t| state.txs.contains_key(t) && !state.inconsistent.contains(t)))
    }

    async fn get_transactions_to_approve(
        &self,
        _depth: u64,
        _reference: Option<&TxHash>,
    ) -> Result<Tips, QuorumError> {
        self.begin_write()?;
        let mut state = self.state.lock();
        Ok(Tips {
            trunk: state.next_tip(),
            branch: state.next_tip(),
        })
    }

    async fn attach_to_tangle(
        &self,
        tips: &Tips,
        mwm: u64,
        txs: &[Transaction],
    ) -> Result<Vec<Transaction>, QuorumError> {
        self.begin_write()?;
        attach(&tips.trunk, &tips.branch, mwm, txs).map_err(|e| QuorumError::Rejected {
            node: SIMULATED_NODE.into(),
            reason: e.to_string(),
        })
    }

    async fn broadcast_and_store(&self, txs: &[Transaction]) -> Result<(), QuorumError> {
        self.begin_write()?;
        let mut state = self.state.lock();
        state.store(txs);
        state.broadcasts.push(txs.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(c: char) -> Address {
        Address::new(c.to_string().repeat(81)).unwrap()
    }

    #[tokio::test]
    async fn test_transfer_counts_only_once_confirmed() {
        let ledger = SimulatedLedger::new();
        let to = address('D');
        let txs = ledger.inject_transfer(&to, 100);

        assert_eq!(ledger.get_balances(&[to.clone()]).await.unwrap(), vec![0]);
        let found = ledger.find_transactions(&[to.clone()]).await.unwrap();
        assert_eq!(found.len(), 1);

        let tail = txs.iter().find(|tx| tx.is_tail()).unwrap();
        assert_eq!(
            ledger.get_inclusion_states(&[tail.hash.clone()]).await.unwrap(),
            vec![false]
        );
        ledger.confirm_bundle(&tail.bundle);
        assert_eq!(ledger.get_balances(&[to]).await.unwrap(), vec![100]);
        assert_eq!(
            ledger.get_inclusion_states(&[tail.hash.clone()]).await.unwrap(),
            vec![true]
        );
    }

    #[tokio::test]
    async fn test_every_transaction_of_a_confirmed_bundle_is_included() {
        let ledger = SimulatedLedger::new();
        let txs = ledger.inject_transfer(&address('N'), 10);
        let non_tail: Vec<TxHash> = txs
            .iter()
            .filter(|tx| !tx.is_tail())
            .map(|tx| tx.hash.clone())
            .collect();
        assert!(!non_tail.is_empty());

        ledger.confirm_bundle(&txs[0].bundle);
        let states = ledger.get_inclusion_states(&non_tail).await.unwrap();
        assert!(states.iter().all(|included| *included));
    }

    #[tokio::test]
    async fn test_confirming_one_attachment_leaves_the_other() {
        let ledger = SimulatedLedger::new();
        let first = ledger.inject_transfer(&address('R'), 10);
        let tips = ledger.get_transactions_to_approve(3, None).await.unwrap();
        let second = ledger.attach_to_tangle(&tips, 0, &first).await.unwrap();
        ledger.broadcast_and_store(&second).await.unwrap();
        assert_ne!(first[0].hash, second[0].hash);

        ledger.confirm_tail(&second[0].hash);
        let hashes: Vec<TxHash> = first
            .iter()
            .chain(&second)
            .map(|tx| tx.hash.clone())
            .collect();
        let states = ledger.get_inclusion_states(&hashes).await.unwrap();
        let (old, new) = states.split_at(first.len());
        assert!(old.iter().all(|included| !included));
        assert!(new.iter().all(|included| *included));
        assert_eq!(ledger.balance(&address('R')), 10);
    }

    #[tokio::test]
    async fn test_identical_transfers_are_distinct_bundles() {
        let ledger = SimulatedLedger::new();
        let to = address('E');
        let a = ledger.inject_transfer(&to, 5);
        let b = ledger.inject_transfer(&to, 5);
        assert_ne!(a[0].bundle, b[0].bundle);
    }

    #[tokio::test]
    async fn test_read_failure_injection() {
        let ledger = SimulatedLedger::new();
        ledger.set_read_failure(Some(QuorumError::Unavailable {
            responded: 0,
            total: 3,
        }));
        assert!(ledger.get_balances(&[address('F')]).await.is_err());
        ledger.set_read_failure(None);
        assert!(ledger.get_balances(&[address('F')]).await.is_ok());
    }

    #[tokio::test]
    async fn test_fresh_tips_every_call() {
        let ledger = SimulatedLedger::new();
        let a = ledger.get_transactions_to_approve(3, None).await.unwrap();
        let b = ledger.get_transactions_to_approve(3, None).await.unwrap();
        assert_ne!(a, b);
    }
}
