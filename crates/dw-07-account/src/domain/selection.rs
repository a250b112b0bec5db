//! Input selection.
//!
//! Which deposit addresses may fund a send, and which of them a send takes.

use chrono::{DateTime, Utc};
use dw_03_account_store::{AccountState, DepositRecord};
use shared_types::Address;
use std::collections::BTreeSet;

/// A deposit address with its confirmed balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub address: Address,
    pub key_index: u64,
    pub balance: u64,
}

/// Whether `record`, holding `balance`, may be spent at `now`.
///
/// A multi-use address keeps receiving until its timeout, so it is only
/// spent afterwards. A single-use address is spendable as soon as the
/// expected amount arrived, or after its timeout.
pub fn is_spendable(record: &DepositRecord, balance: u64, now: DateTime<Utc>) -> bool {
    let conditions = &record.conditions;
    if conditions.is_expired(now) {
        return true;
    }
    match conditions.expected_amount {
        Some(expected) if !conditions.multi_use => balance >= expected,
        _ => false,
    }
}

/// Unspent deposit addresses not held by another send.
pub fn unspent<'a>(
    state: &'a AccountState,
    reserved: &'a BTreeSet<Address>,
) -> impl Iterator<Item = &'a DepositRecord> + 'a {
    state
        .deposits
        .values()
        .filter(move |r| !state.is_spent(r.address()) && !reserved.contains(r.address()))
}

/// Greedy smallest-first selection covering `required`.
///
/// # Errors
///
/// The total available when the candidates do not cover `required`.
pub fn select_inputs(mut candidates: Vec<Candidate>, required: u64) -> Result<Vec<Candidate>, u64> {
    candidates.retain(|c| c.balance > 0);
    candidates.sort_by(|a, b| {
        a.balance
            .cmp(&b.balance)
            .then(a.key_index.cmp(&b.key_index))
    });

    let mut selected = Vec::new();
    let mut total = 0u64;
    for candidate in candidates {
        if total >= required {
            break;
        }
        total = total.saturating_add(candidate.balance);
        selected.push(candidate);
    }
    if total >= required {
        Ok(selected)
    } else {
        Err(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dw_04_deposit_conditions::{Conditions, DepositConditions};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn address(c: char) -> Address {
        Address::new(c.to_string().repeat(81)).unwrap()
    }

    fn candidate(c: char, key_index: u64, balance: u64) -> Candidate {
        Candidate {
            address: address(c),
            key_index,
            balance,
        }
    }

    fn record(conditions: Conditions) -> DepositRecord {
        DepositRecord::new(0, DepositConditions::new(address('A'), &conditions).unwrap())
    }

    #[test]
    fn test_multi_use_spendable_only_after_timeout() {
        let r = record(Conditions::multi_use(at(100)));
        assert!(!is_spendable(&r, 1_000, at(99)));
        assert!(is_spendable(&r, 1_000, at(100)));
    }

    #[test]
    fn test_single_use_spendable_once_funded() {
        let r = record(Conditions::single_use(at(100), 50));
        assert!(!is_spendable(&r, 49, at(10)));
        assert!(is_spendable(&r, 50, at(10)));
        assert!(is_spendable(&r, 0, at(200)));
    }

    #[test]
    fn test_smallest_first_until_covered() {
        let picked = select_inputs(
            vec![
                candidate('A', 0, 70),
                candidate('B', 1, 10),
                candidate('C', 2, 0),
                candidate('D', 3, 25),
            ],
            30,
        )
        .unwrap();
        let addresses: Vec<_> = picked.iter().map(|c| c.address.clone()).collect();
        assert_eq!(addresses, vec![address('B'), address('D')]);
    }

    #[test]
    fn test_shortfall_reports_available() {
        assert_eq!(
            select_inputs(vec![candidate('A', 0, 20), candidate('B', 1, 30)], 100),
            Err(50)
        );
        assert_eq!(select_inputs(Vec::new(), 0), Ok(Vec::new()));
    }

    #[test]
    fn test_unspent_skips_spent_and_reserved() {
        let mut state = AccountState::new("seed");
        for (i, c) in ['A', 'B', 'C'].into_iter().enumerate() {
            let cda = DepositConditions::new(address(c), &Conditions::multi_use(at(100))).unwrap();
            state.add_deposit(DepositRecord::new(i as u64, cda));
        }
        state.mark_spent(address('A'));
        let reserved = BTreeSet::from([address('B')]);

        let left: Vec<_> = unspent(&state, &reserved).map(|r| r.address().clone()).collect();
        assert_eq!(left, vec![address('C')]);
    }
}
