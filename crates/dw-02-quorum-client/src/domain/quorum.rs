//! The quorum rule.
//!
//! 1. Drop nodes that failed or whose solid milestone lags the reference
//!    (the primary's, else the highest seen) by more than the allowed delta.
//! 2. Fail with `Unavailable` when the dropped share exceeds the tolerance.
//! 3. Group the rest by canonical body hash; the largest group wins if it
//!    holds at least `threshold` of the usable nodes. Ties go to the group
//!    holding the primary, then to the lowest hash.

use super::errors::QuorumError;
use super::settings::QuorumSettings;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

/// Top-level response fields that differ between honest nodes.
pub const VOLATILE_FIELDS: &[&str] = &["duration", "milestone", "milestoneIndex", "references"];

/// Slack for comparing fractions.
const EPSILON: f64 = 1e-9;

/// What one node said.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAnswer {
    Body(Value),
    /// The node answered with an error body; counts as a response.
    Rejected(String),
    /// Timeout, connection error or unreadable body.
    Failed(String),
}

/// A node's answer together with its reported solid milestone.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReply {
    pub node: String,
    pub milestone: Option<u64>,
    pub answer: NodeAnswer,
}

impl NodeReply {
    fn answered(&self) -> bool {
        !matches!(self.answer, NodeAnswer::Failed(_))
    }
}

/// SHA-256 over the body with volatile fields removed and keys sorted.
pub fn canonical_hash(body: &Value) -> String {
    let mut stripped = body.clone();
    if let Value::Object(map) = &mut stripped {
        for field in VOLATILE_FIELDS {
            map.remove(*field);
        }
    }
    let mut canonical = String::new();
    write_canonical(&stripped, &mut canonical);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

struct Group<'a> {
    count: usize,
    has_primary: bool,
    first_node: &'a str,
    answer: &'a NodeAnswer,
}

/// Apply the quorum rule to one round of replies.
pub fn evaluate_quorum(
    command: &str,
    replies: &[NodeReply],
    settings: &QuorumSettings,
) -> Result<Value, QuorumError> {
    let total = replies.len();
    let reference = replies
        .iter()
        .find(|r| r.node == settings.primary && r.answered())
        .and_then(|r| r.milestone)
        .or_else(|| {
            replies
                .iter()
                .filter(|r| r.answered())
                .filter_map(|r| r.milestone)
                .max()
        });

    let usable: Vec<&NodeReply> = replies
        .iter()
        .filter(|r| r.answered())
        .filter(|r| match (r.milestone, reference) {
            (Some(m), Some(reference)) => {
                let lag = reference.saturating_sub(m);
                if lag > settings.max_subtangle_milestone_delta {
                    debug!(node = %r.node, lag, "[dw-02] Stale node ignored");
                    false
                } else {
                    true
                }
            }
            _ => false,
        })
        .collect();

    let responded = usable.len();
    let missing = (total - responded) as f64;
    if responded == 0 || missing > settings.no_response_tolerance * total as f64 + EPSILON {
        return Err(QuorumError::Unavailable { responded, total });
    }

    let mut groups: BTreeMap<String, Group<'_>> = BTreeMap::new();
    for reply in &usable {
        let hash = match &reply.answer {
            NodeAnswer::Body(body) => canonical_hash(body),
            NodeAnswer::Rejected(reason) => canonical_hash(&json!({ "error": reason })),
            NodeAnswer::Failed(_) => continue,
        };
        let group = groups.entry(hash).or_insert(Group {
            count: 0,
            has_primary: false,
            first_node: &reply.node,
            answer: &reply.answer,
        });
        group.count += 1;
        group.has_primary |= reply.node == settings.primary;
    }

    // max_by_key keeps the last maximum; iterating in reverse makes that the
    // lowest hash.
    let Some(winner) = groups
        .values()
        .rev()
        .max_by_key(|g| (g.count, g.has_primary))
    else {
        return Err(QuorumError::Unavailable { responded, total });
    };

    if (winner.count as f64) + EPSILON < settings.threshold * responded as f64 {
        debug!(
            command,
            groups = groups.len(),
            largest = winner.count,
            responded,
            "[dw-02] No agreement"
        );
        return Err(QuorumError::Disagreement {
            largest: winner.count,
            responded,
        });
    }

    match winner.answer {
        NodeAnswer::Body(body) => Ok(body.clone()),
        NodeAnswer::Rejected(reason) => Err(QuorumError::Rejected {
            node: winner.first_node.to_string(),
            reason: reason.clone(),
        }),
        NodeAnswer::Failed(reason) => Err(QuorumError::Node {
            node: winner.first_node.to_string(),
            reason: reason.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(n: usize) -> QuorumSettings {
        let nodes: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
        let mut s = QuorumSettings::new("n0", nodes);
        s.threshold = 0.6;
        s.no_response_tolerance = 0.2;
        s
    }

    fn body(tag: &str) -> NodeAnswer {
        NodeAnswer::Body(json!({ "balances": [tag], "duration": 3 }))
    }

    fn replies(answers: Vec<NodeAnswer>) -> Vec<NodeReply> {
        answers
            .into_iter()
            .enumerate()
            .map(|(i, answer)| NodeReply {
                node: format!("n{i}"),
                milestone: Some(100),
                answer,
            })
            .collect()
    }

    #[test]
    fn test_three_of_five_agree() {
        let r = replies(vec![body("A"), body("A"), body("A"), body("B"), body("B")]);
        let value = evaluate_quorum("getBalances", &r, &settings(5)).unwrap();
        assert_eq!(value["balances"], json!(["A"]));
    }

    #[test]
    fn test_two_two_one_disagrees() {
        let r = replies(vec![body("A"), body("A"), body("B"), body("B"), body("C")]);
        assert_eq!(
            evaluate_quorum("getBalances", &r, &settings(5)),
            Err(QuorumError::Disagreement {
                largest: 2,
                responded: 5
            })
        );
    }

    #[test]
    fn test_four_timeouts_unavailable() {
        let timeout = || NodeAnswer::Failed("timeout".into());
        let r = replies(vec![body("A"), timeout(), timeout(), timeout(), timeout()]);
        assert_eq!(
            evaluate_quorum("getBalances", &r, &settings(5)),
            Err(QuorumError::Unavailable {
                responded: 1,
                total: 5
            })
        );
    }

    #[test]
    fn test_tie_goes_to_primary_group() {
        let mut s = settings(4);
        s.threshold = 0.5;
        s.no_response_tolerance = 0.0;
        // n0 (primary) answers B.
        let r = replies(vec![body("B"), body("A"), body("A"), body("B")]);
        let value = evaluate_quorum("getBalances", &r, &s).unwrap();
        assert_eq!(value["balances"], json!(["B"]));
    }

    #[test]
    fn test_stale_nodes_are_discarded() {
        let mut s = settings(5);
        s.no_response_tolerance = 0.5;
        let mut r = replies(vec![body("A"), body("A"), body("A"), body("B"), body("B")]);
        // The B nodes lag two milestones behind the primary.
        r[3].milestone = Some(98);
        r[4].milestone = Some(98);
        let value = evaluate_quorum("getBalances", &r, &s).unwrap();
        assert_eq!(value["balances"], json!(["A"]));

        // Without tolerance for them the read is unavailable.
        s.no_response_tolerance = 0.2;
        assert!(matches!(
            evaluate_quorum("getBalances", &r, &s),
            Err(QuorumError::Unavailable { responded: 3, total: 5 })
        ));
    }

    #[test]
    fn test_agreed_rejection_is_returned() {
        let reject = || NodeAnswer::Rejected("invalid addresses".into());
        let r = replies(vec![reject(), reject(), reject(), body("A"), body("A")]);
        assert!(matches!(
            evaluate_quorum("getBalances", &r, &settings(5)),
            Err(QuorumError::Rejected { .. })
        ));
    }

    #[test]
    fn test_canonical_hash_ignores_volatile_fields_and_key_order() {
        let a = json!({ "states": [true], "duration": 1, "info": { "x": 1, "y": 2 } });
        let b = json!({ "info": { "y": 2, "x": 1 }, "states": [true], "duration": 999 });
        assert_eq!(canonical_hash(&a), canonical_hash(&b));
        assert_ne!(canonical_hash(&a), canonical_hash(&json!({ "states": [false] })));
    }
}
