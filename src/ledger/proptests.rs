//! Property-based tests for the voting power ledger
//!
//! Tests for:
//! - Historical lookups: step function over checkpoints, zero before history
//! - Aggregate: sum of all power equals total supply at every sequence
//! - Rejected operations leave the ledger untouched

use super::{LedgerError, VotingLedger};
use crate::types::{Address, Amount, Sequence};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Mint(u64, Amount),
    Burn(u64, Amount),
    Transfer(u64, u64, Amount),
    Delegate(u64, u64),
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let account = 1u64..6;
    prop_oneof![
        (account.clone(), 0u128..1_000).prop_map(|(a, n)| Op::Mint(a, n)),
        (account.clone(), 0u128..500).prop_map(|(a, n)| Op::Burn(a, n)),
        (account.clone(), account.clone(), 0u128..500)
            .prop_map(|(a, b, n)| Op::Transfer(a, b, n)),
        (account.clone(), 0u64..6).prop_map(|(a, b)| Op::Delegate(a, b)),
        (1u64..4).prop_map(Op::Advance),
    ]
}

/// Apply ops, returning the ledger and the final sequence.
fn replay(ops: &[Op]) -> (VotingLedger, Sequence) {
    let mut ledger = VotingLedger::default();
    let mut now: Sequence = 1;
    for op in ops {
        let before = ledger.clone();
        let result: Result<(), LedgerError> = match op {
            Op::Mint(a, n) => ledger.mint(Address::from_low_u64(*a), *n, now),
            Op::Burn(a, n) => ledger.burn(Address::from_low_u64(*a), *n, now),
            Op::Transfer(a, b, n) => ledger.transfer(
                Address::from_low_u64(*a),
                Address::from_low_u64(*b),
                *n,
                now,
            ),
            Op::Delegate(a, b) => {
                ledger.delegate(Address::from_low_u64(*a), Address::from_low_u64(*b), now)
            }
            Op::Advance(by) => {
                now += by;
                Ok(())
            }
        };
        if result.is_err() {
            assert_eq!(ledger, before, "failed op {:?} mutated the ledger", op);
        }
    }
    (ledger, now)
}

proptest! {
    /// Property: lookups follow the recorded checkpoints exactly
    /// For every account and sequence, the value is the latest checkpoint at
    /// or before that sequence, or zero before the first one.
    #[test]
    fn lookup_is_right_continuous_step_function(
        ops in prop::collection::vec(op_strategy(), 1..60),
    ) {
        let (ledger, now) = replay(&ops);

        for holder in ledger.power_holders() {
            let cps: Vec<_> = ledger.checkpoints(holder).unwrap().iter().copied().collect();

            for w in cps.windows(2) {
                prop_assert!(w[0].at_sequence < w[1].at_sequence);
            }

            for s in 0..=now {
                let expected = cps
                    .iter()
                    .rev()
                    .find(|c| c.at_sequence <= s)
                    .map(|c| c.power)
                    .unwrap_or(0);
                prop_assert_eq!(ledger.get_past_votes(holder, s, now).unwrap(), expected);
            }
        }
    }

    /// Property: voting power is conserved
    /// At every sequence the sum of all accounts' power equals total supply.
    #[test]
    fn power_sum_matches_total_supply(
        ops in prop::collection::vec(op_strategy(), 1..60),
    ) {
        let (ledger, now) = replay(&ops);

        for s in 0..=now {
            let sum: Amount = ledger
                .power_holders()
                .map(|h| ledger.get_past_votes(h, s, now).unwrap())
                .sum();
            prop_assert_eq!(sum, ledger.total_supply_at(s, now).unwrap());
        }
    }

    /// Property: lookups beyond the current sequence always fail
    #[test]
    fn future_lookup_always_fails(
        ops in prop::collection::vec(op_strategy(), 1..20),
        ahead in 1u64..1_000,
    ) {
        let (ledger, now) = replay(&ops);
        let probe = Address::from_low_u64(1);
        let is_future_err = matches!(
            ledger.get_past_votes(&probe, now + ahead, now),
            Err(LedgerError::FutureLookup { .. })
        );
        prop_assert!(is_future_err);
    }
}
