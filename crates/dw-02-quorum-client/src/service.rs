//! # Quorum Client Service
//!
//! `QuorumClient` implements `LedgerApi` over a `NodeTransport`:
//!
//! | Command | Routed to | Accepted when |
//! |---------|-----------|---------------|
//! | reads (`findTransactions`, `getBalances`, ...) | every node | quorum rule holds |
//! | `getTransactionsToApprove`, `attachToTangle` | primary | primary answers |
//! | `broadcastTransactions`, `storeTransactions` | every node | primary accepts |
//!
//! Reads are retried with backoff on `Unavailable` only. A disagreement is
//! returned at once.

use crate::adapters::HttpTransport;
use crate::domain::wire::*;
use crate::domain::{
    evaluate_quorum, NodeAnswer, NodeInfo, NodeReply, QuorumError, QuorumSettings, Tips,
};
use crate::ports::{LedgerApi, NodeTransport};
use async_trait::async_trait;
use dw_telemetry::{metric_inc, time_histogram, NODE_REQUEST_DURATION, QUORUM_OUTCOMES};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared_types::{Address, Transaction, TxHash};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Stateless quorum client; holds only settings and the transport pool.
pub struct QuorumClient {
    settings: QuorumSettings,
    transport: Arc<dyn NodeTransport>,
    /// Bounded worker pool for in-flight node requests.
    permits: Arc<Semaphore>,
}

impl QuorumClient {
    pub fn new(
        settings: QuorumSettings,
        transport: Arc<dyn NodeTransport>,
    ) -> Result<Self, QuorumError> {
        settings.validate()?;
        let permits = Arc::new(Semaphore::new(settings.max_in_flight));
        Ok(Self {
            settings,
            transport,
            permits,
        })
    }

    /// Client over HTTP with one shared connection pool.
    pub fn http(settings: QuorumSettings) -> Result<Self, QuorumError> {
        let transport = HttpTransport::new(settings.timeout)?;
        Self::new(settings, Arc::new(transport))
    }

    pub fn settings(&self) -> &QuorumSettings {
        &self.settings
    }

    async fn call_node(&self, node: &str, request: &Value) -> Result<Value, QuorumError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| QuorumError::Node {
                node: node.to_string(),
                reason: "worker pool closed".into(),
            })?;
        let _timer = time_histogram!(NODE_REQUEST_DURATION);
        match tokio::time::timeout(self.settings.timeout, self.transport.call(node, request)).await
        {
            Ok(result) => result,
            Err(_) => Err(QuorumError::Node {
                node: node.to_string(),
                reason: "timeout".into(),
            }),
        }
    }

    /// Ask one node, together with its solid milestone.
    async fn ask(&self, node: &str, request: &Value, is_info: bool) -> NodeReply {
        let (info, result) = if is_info {
            let result = self.call_node(node, request).await;
            (result.clone().ok(), result)
        } else {
            let info_request = node_info_request();
            let (info, result) = tokio::join!(
                self.call_node(node, &info_request),
                self.call_node(node, request)
            );
            (info.ok(), result)
        };
        let milestone = info
            .as_ref()
            .and_then(|info| info.get("latestSolidSubtangleMilestoneIndex"))
            .and_then(Value::as_u64);
        let answer = match result {
            Ok(body) => NodeAnswer::Body(body),
            Err(QuorumError::Rejected { reason, .. }) => NodeAnswer::Rejected(reason),
            Err(e) => NodeAnswer::Failed(e.to_string()),
        };
        NodeReply {
            node: node.to_string(),
            milestone,
            answer,
        }
    }

    async fn read_once(&self, request: &Value) -> Result<Value, QuorumError> {
        let command = command_of(request);
        let is_info = command == GET_NODE_INFO;
        let replies = join_all(
            self.settings
                .nodes
                .iter()
                .map(|node| self.ask(node, request, is_info)),
        )
        .await;

        let outcome = evaluate_quorum(command, &replies, &self.settings);
        let label = match &outcome {
            Ok(_) => "agreed",
            Err(QuorumError::Unavailable { .. }) => "unavailable",
            Err(QuorumError::Disagreement { .. }) => "disagreement",
            Err(_) => "rejected",
        };
        metric_inc!(QUORUM_OUTCOMES, &[command, label]);
        outcome
    }

    /// Quorum read with backoff on `Unavailable`.
    pub async fn read(&self, request: &Value) -> Result<Value, QuorumError> {
        let retry = &self.settings.retry;
        let mut attempt = 1;
        loop {
            match self.read_once(request).await {
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    let delay = retry.delay(attempt);
                    warn!(
                        command = command_of(request),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "[dw-02] Quorum unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Send `request` to the primary node only.
    pub async fn primary(&self, request: &Value) -> Result<Value, QuorumError> {
        self.call_node(&self.settings.primary, request).await
    }

    /// Send `request` to every node (and the primary); succeed when the
    /// primary accepts.
    async fn to_all(&self, request: &Value) -> Result<(), QuorumError> {
        let mut targets: Vec<&str> = self.settings.nodes.iter().map(String::as_str).collect();
        if !targets.contains(&self.settings.primary.as_str()) {
            targets.push(&self.settings.primary);
        }
        let results = join_all(targets.iter().map(|node| self.call_node(node, request))).await;

        let mut primary_result = None;
        for (node, result) in targets.iter().zip(results) {
            if let Err(e) = &result {
                debug!(node, error = %e, command = command_of(request), "[dw-02] Node refused write");
            }
            if *node == self.settings.primary {
                primary_result = Some(result);
            }
        }
        match primary_result {
            Some(Ok(_)) => Ok(()),
            Some(Err(e)) => Err(e),
            None => Err(QuorumError::Node {
                node: self.settings.primary.clone(),
                reason: "primary not contacted".into(),
            }),
        }
    }
}

fn parse<T: DeserializeOwned>(command: &str, value: Value) -> Result<T, QuorumError> {
    serde_json::from_value(value).map_err(|e| QuorumError::InvalidResponse {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

fn expect_len<T>(command: &str, items: Vec<T>, expected: usize) -> Result<Vec<T>, QuorumError> {
    if items.len() != expected {
        return Err(QuorumError::InvalidResponse {
            command: command.to_string(),
            reason: format!("expected {expected} entries, got {}", items.len()),
        });
    }
    Ok(items)
}

#[async_trait]
impl LedgerApi for QuorumClient {
    async fn node_info(&self) -> Result<NodeInfo, QuorumError> {
        let value = self.primary(&node_info_request()).await?;
        parse(GET_NODE_INFO, value)
    }

    async fn find_transactions(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Transaction>, QuorumError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let found: HashesResponse = parse(
            FIND_TRANSACTIONS,
            self.read(&find_transactions_request(addresses)).await?,
        )?;
        if found.hashes.is_empty() {
            return Ok(Vec::new());
        }
        let txs: TransactionsResponse = parse(
            GET_TRANSACTIONS,
            self.read(&get_transactions_request(&found.hashes)).await?,
        )?;
        Ok(txs.transactions)
    }

    async fn get_balances(&self, addresses: &[Address]) -> Result<Vec<u64>, QuorumError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let response: BalancesResponse =
            parse(GET_BALANCES, self.read(&get_balances_request(addresses)).await?)?;
        expect_len(GET_BALANCES, response.balances, addresses.len())
    }

    async fn get_inclusion_states(&self, tails: &[TxHash]) -> Result<Vec<bool>, QuorumError> {
        if tails.is_empty() {
            return Ok(Vec::new());
        }
        let response: InclusionStatesResponse = parse(
            GET_INCLUSION_STATES,
            self.read(&inclusion_states_request(tails)).await?,
        )?;
        expect_len(GET_INCLUSION_STATES, response.states, tails.len())
    }

    async fn check_consistency(&self, tails: &[TxHash]) -> Result<bool, QuorumError> {
        let response: ConsistencyResponse = parse(
            CHECK_CONSISTENCY,
            self.read(&check_consistency_request(tails)).await?,
        )?;
        if let Some(info) = response.info.as_deref().filter(|_| !response.state) {
            debug!(info, "[dw-02] Tails inconsistent");
        }
        Ok(response.state)
    }

    async fn get_transactions_to_approve(
        &self,
        depth: u64,
        reference: Option<&TxHash>,
    ) -> Result<Tips, QuorumError> {
        let value = self.primary(&tips_request(depth, reference)).await?;
        parse(GET_TRANSACTIONS_TO_APPROVE, value)
    }

    async fn attach_to_tangle(
        &self,
        tips: &Tips,
        mwm: u64,
        txs: &[Transaction],
    ) -> Result<Vec<Transaction>, QuorumError> {
        let value = self.primary(&attach_request(tips, mwm, txs)).await?;
        let response: TransactionsResponse = parse(ATTACH_TO_TANGLE, value)?;
        expect_len(ATTACH_TO_TANGLE, response.transactions, txs.len())
    }

    async fn broadcast_and_store(&self, txs: &[Transaction]) -> Result<(), QuorumError> {
        self.to_all(&broadcast_request(txs)).await?;
        self.to_all(&store_request(txs)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{NodeBehaviour, ScriptedTransport};
    use serde_json::json;
    use std::time::Duration;

    fn nodes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://node{i}")).collect()
    }

    fn client(transport: Arc<ScriptedTransport>, n: usize) -> QuorumClient {
        let mut settings = QuorumSettings::new("http://node0", nodes(n));
        settings.threshold = 0.6;
        settings.no_response_tolerance = 0.2;
        settings.timeout = Duration::from_millis(100);
        settings.retry.base_delay = Duration::from_millis(10);
        QuorumClient::new(settings, transport).unwrap()
    }

    fn balances(value: u64) -> NodeBehaviour {
        NodeBehaviour::Reply(json!({ "balances": [value], "duration": 5 }))
    }

    fn address() -> Address {
        Address::new("A".repeat(81)).unwrap()
    }

    #[tokio::test]
    async fn test_majority_answer_is_returned() {
        let transport = Arc::new(ScriptedTransport::new());
        for (i, value) in [1, 1, 1, 2, 2].into_iter().enumerate() {
            transport.script(&format!("http://node{i}"), balances(value));
        }
        let client = client(transport, 5);
        assert_eq!(client.get_balances(&[address()]).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_split_answer_is_disagreement_without_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        for (i, value) in [1, 1, 2, 2, 3].into_iter().enumerate() {
            transport.script(&format!("http://node{i}"), balances(value));
        }
        let client = client(transport.clone(), 5);
        let err = client.get_balances(&[address()]).await.unwrap_err();
        assert!(matches!(err, QuorumError::Disagreement { largest: 2, responded: 5 }));
        assert_eq!(transport.calls_for(GET_BALANCES), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_are_unavailable_after_retries() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script("http://node0", balances(1));
        for i in 1..5 {
            transport.script(&format!("http://node{i}"), NodeBehaviour::Hang);
        }
        let client = client(transport.clone(), 5);
        let err = client.get_balances(&[address()]).await.unwrap_err();
        assert!(matches!(err, QuorumError::Unavailable { responded: 1, total: 5 }));
        // Three attempts, five nodes each.
        assert_eq!(transport.calls_for(GET_BALANCES), 15);
    }

    #[tokio::test]
    async fn test_broadcast_succeeds_when_primary_accepts() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script("http://node0", NodeBehaviour::Reply(json!({})));
        transport.script("http://node1", NodeBehaviour::Fail("connection refused".into()));
        let client = client(transport.clone(), 2);
        client.broadcast_and_store(&[]).await.unwrap();
        assert_eq!(transport.calls_for(BROADCAST_TRANSACTIONS), 2);
        assert_eq!(transport.calls_for(STORE_TRANSACTIONS), 2);

        transport.script("http://node0", NodeBehaviour::Reject("invalid bundle".into()));
        let err = client.broadcast_and_store(&[]).await.unwrap_err();
        assert!(matches!(err, QuorumError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_tips_come_from_primary_only() {
        let transport = Arc::new(ScriptedTransport::new());
        let tip = TxHash::new("T".repeat(81)).unwrap();
        transport.script(
            "http://node0",
            NodeBehaviour::Reply(json!({
                "trunkTransaction": tip,
                "branchTransaction": tip,
                "duration": 12
            })),
        );
        let client = client(transport.clone(), 3);
        let tips = client.get_transactions_to_approve(3, None).await.unwrap();
        assert_eq!(tips.trunk, tip);
        assert_eq!(transport.calls_for(GET_TRANSACTIONS_TO_APPROVE), 1);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let settings = QuorumSettings::new("http://node0", Vec::new());
        assert!(QuorumClient::new(settings, transport).is_err());
    }
}
