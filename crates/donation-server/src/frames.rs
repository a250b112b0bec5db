//! Live feed wire frames.
//!
//! Every frame is `{ "msg_type": u8, "data": ..., "ts": rfc3339 }`. The
//! numeric codes are part of the page contract and never change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_bus::AccountEvent;

/// Stable frame codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    Stop = 0,
    Promotion = 1,
    Reattachment = 2,
    Sending = 3,
    Confirmed = 4,
    ReceivingDeposit = 5,
    ReceivedDeposit = 6,
    ReceivedMessage = 7,
    Error = 8,
    Balance = 9,
}

impl MsgType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// `{usable, total}` as reported by `balance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub usable: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveFrame {
    pub msg_type: u8,
    pub data: Value,
    pub ts: DateTime<Utc>,
}

impl LiveFrame {
    pub fn new(msg_type: MsgType, data: Value, ts: DateTime<Utc>) -> Self {
        Self {
            msg_type: msg_type.code(),
            data,
            ts,
        }
    }

    pub fn balance(balance: Balance, ts: DateTime<Utc>) -> Self {
        Self::new(MsgType::Balance, json!(balance), ts)
    }

    /// Frame for an account event.
    pub fn from_event(event: &AccountEvent, ts: DateTime<Utc>) -> Self {
        let (msg_type, data) = match event {
            AccountEvent::Promotion {
                bundle_hash,
                promotion_tail_tx_hash,
            } => (
                MsgType::Promotion,
                json!({ "bundle_hash": bundle_hash, "promotion_tail_tx_hash": promotion_tail_tx_hash }),
            ),
            AccountEvent::Reattachment {
                bundle_hash,
                reattachment_tail_tx_hash,
            } => (
                MsgType::Reattachment,
                json!({ "bundle_hash": bundle_hash, "reattachment_tail_tx_hash": reattachment_tail_tx_hash }),
            ),
            AccountEvent::Sending { tails } => (MsgType::Sending, json!(tails)),
            AccountEvent::Confirmed { tails } => (MsgType::Confirmed, json!(tails)),
            AccountEvent::ReceivingDeposit { tails } => (MsgType::ReceivingDeposit, json!(tails)),
            AccountEvent::ReceivedDeposit { tails } => (MsgType::ReceivedDeposit, json!(tails)),
            AccountEvent::ReceivedMessage { tails } => (MsgType::ReceivedMessage, json!(tails)),
            AccountEvent::InternalError(err) => (MsgType::Error, json!(err)),
            AccountEvent::Shutdown => (MsgType::Stop, Value::Null),
        };
        Self::new(msg_type, data, ts)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BundleHash, ErrorKind, TxHash};

    fn ts() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_codes_are_stable() {
        let codes = [
            (MsgType::Stop, 0),
            (MsgType::Promotion, 1),
            (MsgType::Reattachment, 2),
            (MsgType::Sending, 3),
            (MsgType::Confirmed, 4),
            (MsgType::ReceivingDeposit, 5),
            (MsgType::ReceivedDeposit, 6),
            (MsgType::ReceivedMessage, 7),
            (MsgType::Error, 8),
            (MsgType::Balance, 9),
        ];
        for (msg_type, code) in codes {
            assert_eq!(msg_type.code(), code, "{msg_type:?}");
        }
    }

    #[test]
    fn test_event_frames() {
        let stop = LiveFrame::from_event(&AccountEvent::Shutdown, ts());
        assert_eq!(stop.msg_type, 0);
        assert_eq!(stop.data, Value::Null);

        let promotion = LiveFrame::from_event(
            &AccountEvent::Promotion {
                bundle_hash: BundleHash::null(),
                promotion_tail_tx_hash: TxHash::null(),
            },
            ts(),
        );
        assert_eq!(promotion.msg_type, 1);
        assert!(promotion.data.get("promotion_tail_tx_hash").is_some());

        let error = LiveFrame::from_event(
            &AccountEvent::internal(ErrorKind::PollOverrun, "tick skipped"),
            ts(),
        );
        assert_eq!(error.msg_type, 8);
        assert_eq!(error.data["message"], "tick skipped");
    }

    #[test]
    fn test_frame_json_shape() {
        let frame = LiveFrame::balance(Balance { usable: 3, total: 10 }, ts());
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["msg_type"], 9);
        assert_eq!(value["data"]["usable"], 3);
        assert_eq!(value["data"]["total"], 10);
        assert_eq!(value["ts"], "2023-11-14T22:13:20Z");
    }
}
