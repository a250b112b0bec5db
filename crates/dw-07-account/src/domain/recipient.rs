//! Transfer recipients.

use dw_04_deposit_conditions::{ConditionsError, DepositConditions};
use shared_crypto::DEFAULT_TAG;
use shared_types::Address;

/// One output of a send.
///
/// A recipient built from deposit conditions is judged by the send oracle
/// before anything is published; a bare address is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: Address,
    pub value: u64,
    pub tag: String,
    pub message: Option<String>,
    pub conditions: Option<DepositConditions>,
}

impl Recipient {
    pub fn new(address: Address, value: u64) -> Self {
        Self {
            address,
            value,
            tag: DEFAULT_TAG.to_string(),
            message: None,
            conditions: None,
        }
    }

    /// Pay into a conditional deposit address.
    pub fn from_conditions(conditions: DepositConditions, value: u64) -> Self {
        Self {
            conditions: Some(conditions.clone()),
            ..Self::new(conditions.address, value)
        }
    }

    /// Parse a magnet link and pay into it.
    pub fn from_magnet(link: &str, value: u64) -> Result<Self, ConditionsError> {
        DepositConditions::from_magnet(link).map(|cda| Self::from_conditions(cda, value))
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use dw_04_deposit_conditions::Conditions;

    #[test]
    fn test_from_conditions_keeps_cda() {
        let address = Address::new("R".repeat(81)).unwrap();
        let timeout = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let cda = DepositConditions::new(address.clone(), &Conditions::multi_use(timeout)).unwrap();

        let recipient = Recipient::from_conditions(cda.clone(), 30).with_message("thanks");
        assert_eq!(recipient.address, address);
        assert_eq!(recipient.conditions, Some(cda.clone()));
        assert_eq!(recipient.message.as_deref(), Some("thanks"));

        let parsed = Recipient::from_magnet(&cda.to_magnet(), 30).unwrap();
        assert_eq!(parsed.conditions, Some(cda));
        assert!(Recipient::from_magnet("iota://nope", 1).is_err());
        assert!(Recipient::new(address, 1).conditions.is_none());
    }
}
