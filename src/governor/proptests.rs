//! Property-based tests for the governor
//!
//! Tests for:
//! - One ballot per account: repeated votes never change the tally
//! - Resolution: Succeeded iff for > against and participation meets quorum

use super::proposal::{ProposalState, VoteType};
use super::settings::{GovernorSettings, QuorumRule};
use super::GovernorError;
use crate::treasury::Call;
use crate::types::{Address, Amount};
use crate::world::{deploy, DeployParams, Deployment};
use proptest::prelude::*;
use std::collections::BTreeMap;

const OWNER: Address = Address::from_low_u64(1);
const PROPOSER: Address = Address::from_low_u64(2);

/// Deploy with `balances[i]` held by account `10 + i` and a proposal open
/// for voting.
fn open_proposal(balances: &[Amount], quorum: Amount) -> (Deployment, crate::types::ProposalId) {
    let params = DeployParams {
        initial_supply: 1_000_000,
        governor: GovernorSettings {
            voting_delay: 1,
            voting_period: 5,
            proposal_threshold: 1,
            quorum: QuorumRule::Fixed(quorum),
        },
        ..Default::default()
    };
    let mut d = deploy(&params, OWNER).unwrap();
    d.world.ledger.transfer(OWNER, PROPOSER, 1, 0).unwrap();
    for (i, amount) in balances.iter().enumerate() {
        d.world
            .ledger
            .transfer(OWNER, Address::from_low_u64(10 + i as u64), *amount, 0)
            .unwrap();
    }
    d.world.advance(1);
    let id = d
        .governor
        .propose(
            &mut d.world,
            PROPOSER,
            vec![Call::transfer(PROPOSER, 0)],
            "property",
        )
        .unwrap();
    d.world.advance(1);
    (d, id)
}

proptest! {
    /// Property: only an account's first ballot is counted
    #[test]
    fn repeated_votes_never_double_tally(
        balances in prop::collection::vec(1u128..10_000, 1..6),
        ballots in prop::collection::vec((0usize..6, 0u8..3), 1..30),
    ) {
        let (mut d, id) = open_proposal(&balances, 0);
        let mut first: BTreeMap<usize, u8> = BTreeMap::new();

        for (voter, support) in ballots {
            let voter = voter % balances.len();
            let address = Address::from_low_u64(10 + voter as u64);
            let result = d.governor.cast_vote(&mut d.world, address, &id, support);
            if first.contains_key(&voter) {
                prop_assert_eq!(result, Err(GovernorError::AlreadyVoted { voter: address }));
            } else {
                prop_assert_eq!(result, Ok(balances[voter]));
                first.insert(voter, support);
            }
        }

        let mut expected = [0u128; 3];
        for (voter, support) in &first {
            expected[*support as usize] += balances[*voter];
        }
        let tally = d.governor.proposal_votes(&d.world, &id).unwrap();
        prop_assert_eq!(tally.against_votes, expected[VoteType::Against as usize]);
        prop_assert_eq!(tally.for_votes, expected[VoteType::For as usize]);
        prop_assert_eq!(tally.abstain_votes, expected[VoteType::Abstain as usize]);
    }

    /// Property: a closed vote succeeds exactly when for strictly exceeds
    /// against and all three choices together meet quorum
    #[test]
    fn resolution_matches_majority_and_quorum(
        for_votes in 0u128..5_000,
        against_votes in 0u128..5_000,
        abstain_votes in 0u128..5_000,
        quorum in 0u128..12_000,
    ) {
        let balances = [for_votes.max(1), against_votes.max(1), abstain_votes.max(1)];
        let (mut d, id) = open_proposal(&balances, quorum);
        for (i, support) in [1u8, 0, 2].into_iter().enumerate() {
            let voter = Address::from_low_u64(10 + i as u64);
            d.governor.cast_vote(&mut d.world, voter, &id, support).unwrap();
        }
        d.world.advance(10);

        let [f, a, ab] = balances;
        let expected = if f > a && f + a + ab >= quorum {
            ProposalState::Succeeded
        } else {
            ProposalState::Defeated
        };
        prop_assert_eq!(d.governor.state(&d.world, &id).unwrap(), expected);
    }
}
