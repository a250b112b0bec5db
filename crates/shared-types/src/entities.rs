//! # Core Domain Entities
//!
//! Ledger entities shared by the account engine.
//!
//! ## Clusters
//!
//! - **Identifiers**: `Address`, `BundleHash`, `TxHash` (81-tryte strings)
//! - **Ledger**: `Transaction`, bundle helpers
//! - **Account**: `SecurityLevel`

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// TRYTES
// =============================================================================

/// Length of an address or hash in trytes.
pub const HASH_TRYTES: usize = 81;

/// The tryte alphabet. Index 0 is the `9` tryte.
pub const TRYTE_ALPHABET: &[u8; 27] = b"9ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// The all-nines hash used as the null address and null reference.
pub const NULL_HASH: &str = "999999999999999999999999999999999999999999999999999999999999999999999999999999999";

/// Errors raised when a string is not a valid tryte identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrytesError {
    /// Wrong number of trytes.
    #[error("expected {expected} trytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A character outside `[A-Z9]`.
    #[error("invalid tryte {0:?}")]
    InvalidTryte(char),
}

/// Check that `s` only contains trytes.
pub fn is_trytes(s: &str) -> bool {
    s.bytes().all(|b| b == b'9' || b.is_ascii_uppercase())
}

fn validate_hash_trytes(s: &str) -> Result<(), TrytesError> {
    if s.len() != HASH_TRYTES {
        return Err(TrytesError::InvalidLength {
            expected: HASH_TRYTES,
            actual: s.len(),
        });
    }
    match s.chars().find(|c| *c != '9' && !c.is_ascii_uppercase()) {
        Some(bad) => Err(TrytesError::InvalidTryte(bad)),
        None => Ok(()),
    }
}

macro_rules! tryte_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate an 81-tryte identifier.
            pub fn new(s: impl Into<String>) -> Result<Self, TrytesError> {
                let s = s.into();
                validate_hash_trytes(&s)?;
                Ok(Self(s))
            }

            /// Wrap trytes produced by a sponge or another trusted source.
            ///
            /// The caller guarantees `s` is 81 trytes; debug builds check it.
            pub fn from_trusted(s: String) -> Self {
                debug_assert!(validate_hash_trytes(&s).is_ok(), "untrusted trytes: {s}");
                Self(s)
            }

            /// The all-nines identifier.
            pub fn null() -> Self {
                Self(NULL_HASH.to_string())
            }

            /// Borrow the tryte string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First ten trytes, for log lines.
            pub fn short(&self) -> &str {
                &self.0[..10]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = TrytesError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = TrytesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

tryte_id!(
    /// An 81-tryte ledger address.
    Address
);

tryte_id!(
    /// Hash identifying a bundle.
    BundleHash
);

tryte_id!(
    /// Hash identifying a single transaction.
    TxHash
);

// =============================================================================
// SECURITY LEVEL
// =============================================================================

/// Number of key fragments per address (1, 2 or 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    /// The level used when nothing else is configured.
    pub const DEFAULT: SecurityLevel = SecurityLevel(2);

    /// Validate a raw level.
    pub fn new(level: u8) -> Option<Self> {
        (1..=3).contains(&level).then_some(Self(level))
    }

    /// Raw value.
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Number of transactions an input occupies in a bundle.
    pub fn fragments(self) -> usize {
        self.0 as usize
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("security level must be 1..=3, got {value}"))
    }
}

impl From<SecurityLevel> for u8 {
    fn from(level: SecurityLevel) -> u8 {
        level.0
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// A single ledger transaction.
///
/// A bundle is the ordered set of transactions sharing a `bundle` hash;
/// the transaction with `current_index == 0` is its tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: TxHash,
    pub address: Address,
    /// Negative for inputs, positive for outputs, zero for messages.
    pub value: i64,
    pub bundle: BundleHash,
    pub current_index: u64,
    pub last_index: u64,
    /// Attachment time in unix seconds.
    pub timestamp: u64,
    pub trunk: TxHash,
    pub branch: TxHash,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub signature_fragment: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl Transaction {
    /// Whether this is the first transaction of its bundle.
    pub fn is_tail(&self) -> bool {
        self.current_index == 0
    }
}

/// Sum of values a bundle moves into `address`.
pub fn value_to(bundle: &[Transaction], address: &Address) -> i64 {
    bundle
        .iter()
        .filter(|tx| &tx.address == address)
        .map(|tx| tx.value)
        .sum()
}

/// Tails among a set of transactions, in input order.
pub fn tails_of(txs: &[Transaction]) -> Vec<Transaction> {
    txs.iter().filter(|tx| tx.is_tail()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(c: char) -> String {
        std::iter::repeat(c).take(HASH_TRYTES).collect()
    }

    #[test]
    fn test_address_validation() {
        assert!(Address::new(addr('A')).is_ok());
        assert!(Address::new(addr('9')).is_ok());
        assert_eq!(
            Address::new("ABC"),
            Err(TrytesError::InvalidLength {
                expected: 81,
                actual: 3
            })
        );
        assert_eq!(Address::new(addr('a')), Err(TrytesError::InvalidTryte('a')));
    }

    #[test]
    fn test_serde_rejects_invalid_trytes() {
        let ok: Result<TxHash, _> = serde_json::from_str(&format!("\"{}\"", addr('Z')));
        assert!(ok.is_ok());
        let bad: Result<TxHash, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_security_level_bounds() {
        assert!(SecurityLevel::new(0).is_none());
        assert_eq!(SecurityLevel::new(3).map(|l| l.fragments()), Some(3));
        assert!(SecurityLevel::new(4).is_none());
    }

    #[test]
    fn test_value_to_sums_only_matching_address() {
        let a = Address::new(addr('A')).unwrap();
        let b = Address::new(addr('B')).unwrap();
        let tx = |address: &Address, value: i64, idx: u64| Transaction {
            hash: TxHash::null(),
            address: address.clone(),
            value,
            bundle: BundleHash::null(),
            current_index: idx,
            last_index: 2,
            timestamp: 0,
            trunk: TxHash::null(),
            branch: TxHash::null(),
            tag: String::new(),
            signature_fragment: String::new(),
            message: None,
        };
        let bundle = vec![tx(&a, 40, 0), tx(&b, -100, 1), tx(&a, 60, 2)];
        assert_eq!(value_to(&bundle, &a), 100);
        assert_eq!(tails_of(&bundle).len(), 1);
    }
}
