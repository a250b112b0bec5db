//! # Ports
//!
//! - `LedgerApi`: what the account engine needs from the ledger (inbound)
//! - `NodeTransport`: one request to one node (outbound)

use crate::domain::{NodeInfo, QuorumError, Tips};
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{Address, Transaction, TxHash};

/// Ledger operations used by the poller, the promoter and the account.
///
/// Reads are answered by quorum; tips and attachment come from the primary;
/// broadcast reaches every node.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn node_info(&self) -> Result<NodeInfo, QuorumError>;

    /// Every transaction touching any of `addresses`.
    async fn find_transactions(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Transaction>, QuorumError>;

    /// Confirmed balances, in the order of `addresses`.
    async fn get_balances(&self, addresses: &[Address]) -> Result<Vec<u64>, QuorumError>;

    /// Whether each tail is confirmed, in the order of `tails`.
    async fn get_inclusion_states(&self, tails: &[TxHash]) -> Result<Vec<bool>, QuorumError>;

    /// Whether the tails can still be approved (promoted).
    async fn check_consistency(&self, tails: &[TxHash]) -> Result<bool, QuorumError>;

    async fn get_transactions_to_approve(
        &self,
        depth: u64,
        reference: Option<&TxHash>,
    ) -> Result<Tips, QuorumError>;

    /// Chain `txs` onto `tips` and do the proof of work.
    async fn attach_to_tangle(
        &self,
        tips: &Tips,
        mwm: u64,
        txs: &[Transaction],
    ) -> Result<Vec<Transaction>, QuorumError>;

    async fn broadcast_and_store(&self, txs: &[Transaction]) -> Result<(), QuorumError>;
}

/// Sends one JSON request to one node.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// # Errors
    ///
    /// `Rejected` when the node answered with an error body, `Node` for
    /// anything that produced no answer.
    async fn call(&self, node: &str, request: &Value) -> Result<Value, QuorumError>;
}
