//! Proposal records, vote types and derived lifecycle states.

use crate::serialization::{digest_of, SerializationError};
use crate::treasury::Call;
use crate::types::{Address, Amount, DescriptionHash, OperationId, ProposalId, Sequence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const PROPOSAL_TAG: &str = "agora.governor.proposal";

/// Derive the id of a proposal from its content.
///
/// Identical `(proposer, calls, description)` always yields the same id,
/// which is what makes resubmission detectable.
pub fn hash_proposal(
    proposer: &Address,
    calls: &[Call],
    description_hash: &DescriptionHash,
) -> Result<ProposalId, SerializationError> {
    digest_of(PROPOSAL_TAG, &(proposer, calls, description_hash)).map(ProposalId)
}

/// Lifecycle state as observed at a sequence.
///
/// Discriminants follow the order external indexers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalState {
    Pending = 0,
    Active = 1,
    Canceled = 2,
    Defeated = 3,
    Succeeded = 4,
    Queued = 5,
    Expired = 6,
    Executed = 7,
}

impl ProposalState {
    /// States a proposal can never leave.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::Defeated | Self::Expired | Self::Executed
        )
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Canceled => "Canceled",
            Self::Defeated => "Defeated",
            Self::Succeeded => "Succeeded",
            Self::Queued => "Queued",
            Self::Expired => "Expired",
            Self::Executed => "Executed",
        };
        f.write_str(name)
    }
}

/// Ballot choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteType {
    Against = 0,
    For = 1,
    Abstain = 2,
}

impl TryFrom<u8> for VoteType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Against),
            1 => Ok(Self::For),
            2 => Ok(Self::Abstain),
            other => Err(other),
        }
    }
}

/// Weighted vote totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub for_votes: Amount,
    pub against_votes: Amount,
    pub abstain_votes: Amount,
}

impl Tally {
    pub fn add(&mut self, support: VoteType, weight: Amount) {
        let slot = match support {
            VoteType::Against => &mut self.against_votes,
            VoteType::For => &mut self.for_votes,
            VoteType::Abstain => &mut self.abstain_votes,
        };
        *slot = slot.saturating_add(weight);
    }

    /// Votes counted toward quorum (all three choices).
    pub fn total(&self) -> Amount {
        self.for_votes
            .saturating_add(self.against_votes)
            .saturating_add(self.abstain_votes)
    }
}

/// Why a closed vote resolved the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalOutcome {
    Passed,
    /// For votes did not strictly exceed against votes.
    MajorityNotReached,
    QuorumNotMet { quorum: Amount, participation: Amount },
}

/// One account's recorded ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub support: VoteType,
    pub weight: Amount,
}

/// Transitions recorded explicitly. Everything else is derived from time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Open,
    Canceled {
        at: Sequence,
    },
    Queued {
        operation_id: OperationId,
        eta: Sequence,
    },
    Executed {
        operation_id: OperationId,
        eta: Sequence,
        at: Sequence,
    },
}

/// A proposal and its ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: Address,
    pub calls: Vec<Call>,
    pub description_hash: DescriptionHash,
    pub created_at: Sequence,
    pub snapshot: Sequence,
    pub deadline: Sequence,
    pub tally: Tally,
    pub status: ProposalStatus,
    receipts: BTreeMap<Address, VoteReceipt>,
}

impl Proposal {
    pub fn new(
        id: ProposalId,
        proposer: Address,
        calls: Vec<Call>,
        description_hash: DescriptionHash,
        created_at: Sequence,
        snapshot: Sequence,
        deadline: Sequence,
    ) -> Self {
        Self {
            id,
            proposer,
            calls,
            description_hash,
            created_at,
            snapshot,
            deadline,
            tally: Tally::default(),
            status: ProposalStatus::Open,
            receipts: BTreeMap::new(),
        }
    }

    pub fn receipt(&self, voter: &Address) -> Option<&VoteReceipt> {
        self.receipts.get(voter)
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.receipts.contains_key(voter)
    }

    pub fn receipts(&self) -> impl Iterator<Item = (&Address, &VoteReceipt)> {
        self.receipts.iter()
    }

    /// Record a ballot. Returns false, changing nothing, if `voter` already
    /// voted.
    pub(crate) fn record_vote(&mut self, voter: Address, receipt: VoteReceipt) -> bool {
        if self.receipts.contains_key(&voter) {
            return false;
        }
        self.tally.add(receipt.support, receipt.weight);
        self.receipts.insert(voter, receipt);
        true
    }

    pub fn operation_id(&self) -> Option<OperationId> {
        match self.status {
            ProposalStatus::Queued { operation_id, .. }
            | ProposalStatus::Executed { operation_id, .. } => Some(operation_id),
            _ => None,
        }
    }

    pub fn eta(&self) -> Option<Sequence> {
        match self.status {
            ProposalStatus::Queued { eta, .. } | ProposalStatus::Executed { eta, .. } => Some(eta),
            _ => None,
        }
    }

    pub fn executed_at(&self) -> Option<Sequence> {
        match self.status {
            ProposalStatus::Executed { at, .. } => Some(at),
            _ => None,
        }
    }
}
