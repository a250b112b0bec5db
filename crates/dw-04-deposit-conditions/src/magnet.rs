//! Magnet links.
//!
//! `iota://<ADDRESS>/?t=<unix_seconds>&m=<0|1>[&am=<u64>]`
//!
//! Parsing is strict: unknown or repeated keys, missing `t`/`m`, and any
//! value that violates the use policy are rejected.

use crate::conditions::DepositConditions;
use crate::errors::ConditionsError;
use shared_types::Address;
use std::fmt;
use std::str::FromStr;

pub const SCHEME: &str = "iota://";

fn invalid(reason: impl Into<String>) -> ConditionsError {
    ConditionsError::InvalidMagnet(reason.into())
}

impl DepositConditions {
    pub fn to_magnet(&self) -> String {
        let mut link = format!(
            "{SCHEME}{}/?t={}&m={}",
            self.address,
            self.timeout_unix(),
            u8::from(self.multi_use)
        );
        if let Some(amount) = self.expected_amount {
            link.push_str(&format!("&am={amount}"));
        }
        link
    }

    pub fn from_magnet(link: &str) -> Result<Self, ConditionsError> {
        let rest = link
            .strip_prefix(SCHEME)
            .ok_or_else(|| invalid(format!("expected scheme {SCHEME}")))?;
        let (address, query) = rest
            .split_once("/?")
            .ok_or_else(|| invalid("expected '/?' after the address"))?;
        let address = Address::new(address).map_err(|e| invalid(format!("address: {e}")))?;

        let mut timeout = None;
        let mut multi_use = None;
        let mut amount = None;
        for pair in query.split('&') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| invalid(format!("malformed pair {pair:?}")))?;
            let slot_taken = match key {
                "t" => timeout
                    .replace(
                        value
                            .parse::<i64>()
                            .map_err(|_| invalid(format!("t={value:?} is not a timestamp")))?,
                    )
                    .is_some(),
                "m" => multi_use
                    .replace(match value {
                        "0" => false,
                        "1" => true,
                        other => return Err(invalid(format!("m={other:?} must be 0 or 1"))),
                    })
                    .is_some(),
                "am" => amount
                    .replace(
                        value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("am={value:?} is not an amount")))?,
                    )
                    .is_some(),
                other => return Err(invalid(format!("unknown key {other:?}"))),
            };
            if slot_taken {
                return Err(invalid(format!("repeated key {key:?}")));
            }
        }

        let timeout = timeout.ok_or_else(|| invalid("missing t"))?;
        let multi_use = multi_use.ok_or_else(|| invalid("missing m"))?;
        DepositConditions::from_parts(address, timeout, multi_use, amount).map_err(|e| match e {
            ConditionsError::InvalidConditions(reason) => invalid(reason),
            other => other,
        })
    }
}

impl fmt::Display for DepositConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_magnet())
    }
}

impl FromStr for DepositConditions {
    type Err = ConditionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_magnet(s.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Conditions;
    use chrono::DateTime;
    use proptest::prelude::*;

    fn address() -> String {
        "A".repeat(81)
    }

    #[test]
    fn test_multi_use_link_parses() {
        let link = format!("iota://{}/?t=1700000000&m=1", address());
        let cda: DepositConditions = link.parse().unwrap();
        assert!(cda.multi_use);
        assert_eq!(cda.expected_amount, None);
        assert_eq!(cda.timeout_unix(), 1_700_000_000);
        assert_eq!(cda.to_magnet(), link);
    }

    #[test]
    fn test_multi_use_with_amount_rejected() {
        let link = format!("iota://{}/?t=1700000000&m=1&am=5", address());
        assert!(matches!(
            DepositConditions::from_magnet(&link),
            Err(ConditionsError::InvalidMagnet(_))
        ));
    }

    #[test]
    fn test_malformed_corpus_rejected() {
        let a = address();
        let corpus = [
            String::new(),
            format!("http://{a}/?t=1&m=1"),
            format!("iota://{a}?t=1&m=1"),
            format!("iota://{a}/?t=1"),
            format!("iota://{a}/?m=1"),
            format!("iota://{a}/?t=1&m=2"),
            format!("iota://{a}/?t=1&m=0"),
            format!("iota://{a}/?t=1&m=0&am=0"),
            format!("iota://{a}/?t=1&m=0&am=-4"),
            format!("iota://{a}/?t=x&m=1"),
            format!("iota://{a}/?t=1&m=1&x=2"),
            format!("iota://{a}/?t=1&t=2&m=1"),
            format!("iota://{a}/?t=1&m=1&"),
            format!("iota://{a}/?t=1&&m=1"),
            format!("iota://{a}/?t&m=1"),
            "iota://ABC/?t=1&m=1".to_string(),
            format!("iota://{}/?t=1&m=1", "a".repeat(81)),
        ];
        for link in corpus {
            assert!(
                matches!(
                    DepositConditions::from_magnet(&link),
                    Err(ConditionsError::InvalidMagnet(_))
                ),
                "accepted {link:?}"
            );
        }
    }

    fn arb_conditions() -> impl Strategy<Value = DepositConditions> {
        (
            "[A-Z9]{81}",
            0i64..4_102_444_800,
            prop_oneof![Just(None), (1u64..=u64::MAX).prop_map(Some)],
        )
            .prop_map(|(address, t, amount)| {
                let timeout_at = DateTime::from_timestamp(t, 0).unwrap();
                let conditions = match amount {
                    Some(am) => Conditions::single_use(timeout_at, am),
                    None => Conditions::multi_use(timeout_at),
                };
                DepositConditions::new(Address::new(address).unwrap(), &conditions).unwrap()
            })
    }

    proptest! {
        #[test]
        fn prop_magnet_round_trip(cda in arb_conditions()) {
            let parsed = DepositConditions::from_magnet(&cda.to_magnet()).unwrap();
            prop_assert_eq!(parsed, cda);
        }
    }
}
