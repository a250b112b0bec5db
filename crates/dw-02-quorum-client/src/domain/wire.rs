//! Node API payloads.
//!
//! Every request is a JSON `POST` carrying a `command` field. Transactions
//! travel as JSON objects rather than raw trytes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{Address, Transaction, TxHash};

pub const GET_NODE_INFO: &str = "getNodeInfo";
pub const FIND_TRANSACTIONS: &str = "findTransactions";
pub const GET_TRANSACTIONS: &str = "getTransactions";
pub const GET_BALANCES: &str = "getBalances";
pub const GET_INCLUSION_STATES: &str = "getInclusionStates";
pub const CHECK_CONSISTENCY: &str = "checkConsistency";
pub const GET_TRANSACTIONS_TO_APPROVE: &str = "getTransactionsToApprove";
pub const ATTACH_TO_TANGLE: &str = "attachToTangle";
pub const BROADCAST_TRANSACTIONS: &str = "broadcastTransactions";
pub const STORE_TRANSACTIONS: &str = "storeTransactions";

/// `getNodeInfo` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub app_version: String,
    pub latest_milestone_index: u64,
    pub latest_solid_subtangle_milestone_index: u64,
}

/// Transactions a new bundle should approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tips {
    #[serde(rename = "trunkTransaction")]
    pub trunk: TxHash,
    #[serde(rename = "branchTransaction")]
    pub branch: TxHash,
}

#[derive(Debug, Deserialize)]
pub struct HashesResponse {
    pub hashes: Vec<TxHash>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
pub struct BalancesResponse {
    pub balances: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct InclusionStatesResponse {
    pub states: Vec<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ConsistencyResponse {
    pub state: bool,
    #[serde(default)]
    pub info: Option<String>,
}

/// Name of the command a request carries.
pub fn command_of(request: &Value) -> &str {
    request
        .get("command")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

pub fn node_info_request() -> Value {
    json!({ "command": GET_NODE_INFO })
}

pub fn find_transactions_request(addresses: &[Address]) -> Value {
    json!({ "command": FIND_TRANSACTIONS, "addresses": addresses })
}

pub fn get_transactions_request(hashes: &[TxHash]) -> Value {
    json!({ "command": GET_TRANSACTIONS, "hashes": hashes })
}

pub fn get_balances_request(addresses: &[Address]) -> Value {
    json!({ "command": GET_BALANCES, "addresses": addresses, "threshold": 100 })
}

pub fn inclusion_states_request(tails: &[TxHash]) -> Value {
    json!({ "command": GET_INCLUSION_STATES, "transactions": tails, "tips": [] })
}

pub fn check_consistency_request(tails: &[TxHash]) -> Value {
    json!({ "command": CHECK_CONSISTENCY, "tails": tails })
}

pub fn tips_request(depth: u64, reference: Option<&TxHash>) -> Value {
    let mut request = json!({ "command": GET_TRANSACTIONS_TO_APPROVE, "depth": depth });
    if let Some(reference) = reference {
        request["reference"] = json!(reference);
    }
    request
}

pub fn attach_request(tips: &Tips, mwm: u64, txs: &[Transaction]) -> Value {
    json!({
        "command": ATTACH_TO_TANGLE,
        "trunkTransaction": tips.trunk,
        "branchTransaction": tips.branch,
        "minWeightMagnitude": mwm,
        "transactions": txs,
    })
}

pub fn broadcast_request(txs: &[Transaction]) -> Value {
    json!({ "command": BROADCAST_TRANSACTIONS, "transactions": txs })
}

pub fn store_request(txs: &[Transaction]) -> Value {
    json!({ "command": STORE_TRANSACTIONS, "transactions": txs })
}
