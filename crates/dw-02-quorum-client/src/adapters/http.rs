//! HTTP transport to ledger nodes.

use crate::domain::QuorumError;
use crate::ports::NodeTransport;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Header every node API request carries.
pub const API_VERSION_HEADER: &str = "X-IOTA-API-Version";

/// Shared connection pool for all nodes.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, QuorumError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| QuorumError::InvalidSettings(e.to_string()))?;
        Ok(Self { client })
    }
}

/// An error body looks like `{"error": "..."}`.
fn error_of(body: &Value) -> Option<String> {
    body.get("error")
        .or_else(|| body.get("exception"))
        .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn call(&self, node: &str, request: &Value) -> Result<Value, QuorumError> {
        let node_err = |reason: String| QuorumError::Node {
            node: node.to_string(),
            reason,
        };

        let response = self
            .client
            .post(node)
            .header(API_VERSION_HEADER, "1")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    node_err(format!("cannot connect to {node}"))
                } else if e.is_timeout() {
                    node_err("timeout".into())
                } else {
                    node_err(e.to_string())
                }
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| node_err(format!("unreadable body (status {status}): {e}")))?;

        if let Some(reason) = error_of(&body) {
            return Err(QuorumError::Rejected {
                node: node.to_string(),
                reason,
            });
        }
        if !status.is_success() {
            return Err(node_err(format!("status {status}")));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_body_detection() {
        assert_eq!(
            error_of(&json!({ "error": "invalid depth" })),
            Some("invalid depth".to_string())
        );
        assert!(error_of(&json!({ "balances": [1] })).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_node_is_node_error() {
        let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
        let result = transport
            .call("http://127.0.0.1:1", &json!({ "command": "getNodeInfo" }))
            .await;
        assert!(matches!(result, Err(QuorumError::Node { .. })));
    }
}
