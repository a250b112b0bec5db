//! Opaque on-disk record for the currently advertised CDA.
//!
//! A JSON object with a `version` and the CDA fields. Members this build
//! does not know are kept and written back, so a record written by a newer
//! build survives a round-trip through this one.

use crate::conditions::DepositConditions;
use crate::errors::ConditionsError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::Address;

pub const RECORD_VERSION: u8 = 1;

/// Decoded record plus whatever it carried that we do not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionsRecord {
    pub version: u8,
    pub conditions: DepositConditions,
    pub unknown: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct RecordWire {
    version: u8,
    address: String,
    timeout: i64,
    multi_use: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected_amount: Option<u64>,
    #[serde(flatten)]
    unknown: Map<String, Value>,
}

fn corrupt(reason: impl Into<String>) -> ConditionsError {
    ConditionsError::CorruptRecord(reason.into())
}

impl ConditionsRecord {
    pub fn new(conditions: DepositConditions) -> Self {
        Self {
            version: RECORD_VERSION,
            conditions,
            unknown: Map::new(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ConditionsError> {
        let c = &self.conditions;
        let wire = RecordWire {
            version: self.version.max(RECORD_VERSION),
            address: c.address.as_str().to_string(),
            timeout: c.timeout_unix(),
            multi_use: c.multi_use,
            expected_amount: c.expected_amount,
            unknown: self.unknown.clone(),
        };
        serde_json::to_vec(&wire).map_err(|e| corrupt(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ConditionsError> {
        let wire: RecordWire =
            serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
        if wire.version == 0 {
            return Err(corrupt("version 0"));
        }
        let address = Address::new(wire.address).map_err(|e| corrupt(e.to_string()))?;
        let conditions = DepositConditions::from_parts(
            address,
            wire.timeout,
            wire.multi_use,
            wire.expected_amount,
        )?;
        Ok(Self {
            version: wire.version,
            conditions,
            unknown: wire.unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Conditions;
    use chrono::DateTime;
    use serde_json::json;

    fn cda(amount: Option<u64>) -> DepositConditions {
        let t = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let conditions = match amount {
            Some(am) => Conditions::single_use(t, am),
            None => Conditions::multi_use(t),
        };
        DepositConditions::new(Address::new("C".repeat(81)).unwrap(), &conditions).unwrap()
    }

    #[test]
    fn test_record_round_trip() {
        for amount in [None, Some(42)] {
            let record = ConditionsRecord::new(cda(amount));
            let bytes = record.encode().unwrap();
            assert_eq!(ConditionsRecord::decode(&bytes).unwrap(), record);
        }
    }

    #[test]
    fn test_unknown_trailing_fields_preserved() {
        let written = json!({
            "version": 7,
            "address": "C".repeat(81),
            "timeout": 1_700_000_000,
            "multi_use": true,
            "label": "coffee",
            "tiers": [1, 5, 10],
        });
        let bytes = serde_json::to_vec(&written).unwrap();

        let decoded = ConditionsRecord::decode(&bytes).unwrap();
        assert_eq!(decoded.version, 7);
        assert_eq!(decoded.conditions, cda(None));
        assert_eq!(decoded.unknown.len(), 2);
        assert_eq!(decoded.unknown["label"], "coffee");

        let rewritten: Value = serde_json::from_slice(&decoded.encode().unwrap()).unwrap();
        assert_eq!(rewritten, written);
    }

    #[test]
    fn test_corrupt_records_rejected() {
        let good = ConditionsRecord::new(cda(Some(3))).encode().unwrap();
        assert!(ConditionsRecord::decode(b"").is_err());
        assert!(ConditionsRecord::decode(b"garbage").is_err());
        assert!(ConditionsRecord::decode(&good[..good.len() - 2]).is_err());

        let rejected = [
            json!({ "version": 1, "address": "C".repeat(81), "timeout": 5 }),
            json!({ "version": 0, "address": "C".repeat(81), "timeout": 5, "multi_use": true }),
            json!({ "version": 1, "address": "short", "timeout": 5, "multi_use": true }),
            json!({ "version": 1, "address": "C".repeat(81), "timeout": "soon", "multi_use": true }),
            json!({
                "version": 1,
                "address": "C".repeat(81),
                "timeout": 5,
                "multi_use": true,
                "expected_amount": 4,
            }),
        ];
        for record in rejected {
            let bytes = serde_json::to_vec(&record).unwrap();
            assert!(
                matches!(
                    ConditionsRecord::decode(&bytes),
                    Err(ConditionsError::CorruptRecord(_) | ConditionsError::InvalidConditions(_))
                ),
                "{record}"
            );
        }
    }
}
