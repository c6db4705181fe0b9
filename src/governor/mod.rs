//! Governor: proposal lifecycle over the world state.
//!
//! - `propose` / `cast_vote` / `cancel` / `queue` / `execute` are the only
//!   writers of the Proposal Store
//! - State is derived on read from stored fields and `World::now`; only
//!   Canceled, Queued and Executed are recorded explicitly
//! - Vote weight is always read at the proposal's snapshot sequence
//! - Every check runs before the first write, so a rejected call never leaves
//!   a partial mutation behind

pub mod events;
pub mod proposal;
pub mod settings;
pub mod store;

#[cfg(test)]
mod proptests;

use crate::ledger::LedgerError;
use crate::serialization::SerializationError;
use crate::timelock::TimelockError;
use crate::treasury::{effects::CallEffects, BatchReceipt, Call};
use crate::types::{Address, Amount, DescriptionHash, ProposalId, Sequence};
use crate::world::World;
use events::GovernanceEvent;
use proposal::{
    hash_proposal, Proposal, ProposalOutcome, ProposalState, ProposalStatus, Tally, VoteReceipt,
    VoteType,
};
use settings::GovernorSettings;
use thiserror::Error;
use tracing::info;

/// Governor errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernorError {
    #[error("proposer has {votes} votes, threshold is {threshold}")]
    BelowThreshold { votes: Amount, threshold: Amount },

    #[error("proposal {0} already exists")]
    DuplicateProposal(ProposalId),

    #[error("proposal is {state}, not Active")]
    ProposalNotActive { state: ProposalState },

    #[error("{voter} already voted")]
    AlreadyVoted { voter: Address },

    #[error("caller may not perform this action")]
    Unauthorized,

    #[error("proposal {0} is already queued")]
    AlreadyQueued(ProposalId),

    #[error("proposal {0} expired in the timelock")]
    OperationExpired(ProposalId),

    #[error("proposal {0} was already executed")]
    AlreadyExecuted(ProposalId),

    #[error("unknown proposal {0}")]
    UnknownProposal(ProposalId),

    #[error("a proposal needs at least one call")]
    EmptyProposal,

    #[error("invalid vote type {0}")]
    InvalidVoteType(u8),

    #[error("proposal is {state}, not Succeeded")]
    ProposalNotSuccessful { state: ProposalState },

    #[error("proposal is {state}, not Queued")]
    ProposalNotQueued { state: ProposalState },

    #[error("proposal is {state} and can no longer be canceled")]
    ProposalNotCancelable { state: ProposalState },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Timelock(#[from] TimelockError),

    #[error("encoding error: {0}")]
    Serialization(String),
}

impl From<SerializationError> for GovernorError {
    fn from(err: SerializationError) -> Self {
        GovernorError::Serialization(err.to_string())
    }
}

/// Governor result type.
pub type GovernorResult<T> = Result<T, GovernorError>;

/// Proposal orchestration under fixed settings.
#[derive(Debug, Clone)]
pub struct Governor {
    settings: GovernorSettings,
}

impl Governor {
    pub fn new(settings: GovernorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &GovernorSettings {
        &self.settings
    }

    pub fn voting_delay(&self) -> Sequence {
        self.settings.voting_delay
    }

    pub fn voting_period(&self) -> Sequence {
        self.settings.voting_period
    }

    pub fn proposal_threshold(&self) -> Amount {
        self.settings.proposal_threshold
    }

    /// Votes required for proposals whose snapshot is `at`.
    pub fn quorum(&self, world: &World, at: Sequence) -> GovernorResult<Amount> {
        let supply = world.ledger.total_supply_at(at, world.now)?;
        Ok(self.settings.quorum.apply(supply))
    }

    /// Voting power of `account` as of `at`.
    pub fn get_votes(&self, world: &World, account: &Address, at: Sequence) -> GovernorResult<Amount> {
        Ok(world.ledger.get_past_votes(account, at, world.now)?)
    }

    /// Submit a proposal. Voting opens `voting_delay` sequences from now.
    pub fn propose(
        &self,
        world: &mut World,
        proposer: Address,
        calls: Vec<Call>,
        description: &str,
    ) -> GovernorResult<ProposalId> {
        if calls.is_empty() {
            return Err(GovernorError::EmptyProposal);
        }

        let now = world.now;
        let votes = world
            .ledger
            .get_past_votes(&proposer, now.saturating_sub(1), now)?;
        if votes < self.settings.proposal_threshold {
            return Err(GovernorError::BelowThreshold {
                votes,
                threshold: self.settings.proposal_threshold,
            });
        }

        let description_hash = DescriptionHash::of(description);
        let id = hash_proposal(&proposer, &calls, &description_hash)?;
        if let Some(existing) = world.proposals.get(&id) {
            if !self.derive_state(world, existing)?.is_terminal() {
                return Err(GovernorError::DuplicateProposal(id));
            }
        }

        let snapshot = now.saturating_add(self.settings.voting_delay);
        let deadline = snapshot.saturating_add(self.settings.voting_period);
        world.proposals.insert(Proposal::new(
            id,
            proposer,
            calls,
            description_hash,
            now,
            snapshot,
            deadline,
        ));
        world.events.push(
            now,
            GovernanceEvent::ProposalCreated {
                id,
                proposer,
                description_hash,
                description: description.to_string(),
                snapshot,
                deadline,
            },
        );
        info!(%id, %proposer, snapshot, deadline, "proposal created");
        Ok(id)
    }

    /// Derived lifecycle state of `id` at `world.now`.
    pub fn state(&self, world: &World, id: &ProposalId) -> GovernorResult<ProposalState> {
        let proposal = self.proposal(world, id)?;
        self.derive_state(world, proposal)
    }

    fn derive_state(&self, world: &World, proposal: &Proposal) -> GovernorResult<ProposalState> {
        let now = world.now;
        match proposal.status {
            ProposalStatus::Executed { .. } => return Ok(ProposalState::Executed),
            ProposalStatus::Canceled { .. } => return Ok(ProposalState::Canceled),
            ProposalStatus::Queued { eta, .. } => {
                let expires_at = eta.saturating_add(world.timelock.grace_period);
                return Ok(if now > expires_at {
                    ProposalState::Expired
                } else {
                    ProposalState::Queued
                });
            }
            ProposalStatus::Open => {}
        }

        if now < proposal.snapshot {
            return Ok(ProposalState::Pending);
        }
        if now < proposal.deadline {
            return Ok(ProposalState::Active);
        }
        Ok(match self.evaluate(world, proposal)? {
            ProposalOutcome::Passed => ProposalState::Succeeded,
            _ => ProposalState::Defeated,
        })
    }

    /// How the tally of `id` resolves against majority and quorum.
    ///
    /// Meaningful once voting has closed; before that it reflects the
    /// running tally.
    pub fn outcome(&self, world: &World, id: &ProposalId) -> GovernorResult<ProposalOutcome> {
        let proposal = self.proposal(world, id)?;
        self.evaluate(world, proposal)
    }

    fn evaluate(&self, world: &World, proposal: &Proposal) -> GovernorResult<ProposalOutcome> {
        let at = proposal.snapshot.min(world.now);
        let quorum = self.quorum(world, at)?;
        let tally = &proposal.tally;
        if tally.total() < quorum {
            return Ok(ProposalOutcome::QuorumNotMet {
                quorum,
                participation: tally.total(),
            });
        }
        if tally.for_votes <= tally.against_votes {
            return Ok(ProposalOutcome::MajorityNotReached);
        }
        Ok(ProposalOutcome::Passed)
    }

    /// Cast a ballot with `support` (0 = Against, 1 = For, 2 = Abstain).
    /// Returns the weight counted.
    pub fn cast_vote(
        &self,
        world: &mut World,
        voter: Address,
        id: &ProposalId,
        support: u8,
    ) -> GovernorResult<Amount> {
        self.cast_vote_with_reason(world, voter, id, support, "")
    }

    pub fn cast_vote_with_reason(
        &self,
        world: &mut World,
        voter: Address,
        id: &ProposalId,
        support: u8,
        reason: &str,
    ) -> GovernorResult<Amount> {
        let support = VoteType::try_from(support).map_err(GovernorError::InvalidVoteType)?;
        let proposal = self.proposal(world, id)?;
        let state = self.derive_state(world, proposal)?;
        if state != ProposalState::Active {
            return Err(GovernorError::ProposalNotActive { state });
        }
        if proposal.has_voted(&voter) {
            return Err(GovernorError::AlreadyVoted { voter });
        }
        let weight = world
            .ledger
            .get_past_votes(&voter, proposal.snapshot, world.now)?;

        let now = world.now;
        let proposal = self.proposal_mut(world, id)?;
        if !proposal.record_vote(voter, VoteReceipt { support, weight }) {
            return Err(GovernorError::AlreadyVoted { voter });
        }
        world.events.push(
            now,
            GovernanceEvent::VoteCast {
                voter,
                id: *id,
                support,
                weight,
                reason: reason.to_string(),
            },
        );
        info!(%id, %voter, ?support, weight, "vote cast");
        Ok(weight)
    }

    /// Cancel `id` on behalf of `caller`.
    ///
    /// The proposer may cancel while Pending or Active. Anyone may cancel a
    /// Pending, Active or Succeeded proposal once the proposer's current
    /// votes have fallen below the threshold. Queued proposals are left to
    /// expire in the timelock.
    pub fn cancel(&self, world: &mut World, caller: Address, id: &ProposalId) -> GovernorResult<()> {
        let proposal = self.proposal(world, id)?;
        let state = self.derive_state(world, proposal)?;
        if !matches!(
            state,
            ProposalState::Pending | ProposalState::Active | ProposalState::Succeeded
        ) {
            return Err(GovernorError::ProposalNotCancelable { state });
        }

        let by_proposer = caller == proposal.proposer
            && matches!(state, ProposalState::Pending | ProposalState::Active);
        let proposer_divested =
            world.ledger.get_votes(&proposal.proposer) < self.settings.proposal_threshold;
        if !by_proposer && !proposer_divested {
            return Err(GovernorError::Unauthorized);
        }

        let now = world.now;
        self.proposal_mut(world, id)?.status = ProposalStatus::Canceled { at: now };
        world
            .events
            .push(now, GovernanceEvent::ProposalCanceled { id: *id });
        info!(%id, %caller, "proposal canceled");
        Ok(())
    }

    /// Schedule a Succeeded proposal in the timelock. Returns the eta.
    pub fn queue(&self, world: &mut World, id: &ProposalId) -> GovernorResult<Sequence> {
        let proposal = self.proposal(world, id)?;
        match self.derive_state(world, proposal)? {
            ProposalState::Succeeded => {}
            ProposalState::Queued => return Err(GovernorError::AlreadyQueued(*id)),
            state => return Err(GovernorError::ProposalNotSuccessful { state }),
        }

        // Salting with the proposal id keeps identical call lists from
        // different proposals on separate timelock entries.
        let calls = proposal.calls.clone();
        let now = world.now;
        let delay = world.timelock.min_delay;
        let (operation_id, eta) = world.timelock.schedule(&calls, None, id.0, delay, now)?;

        self.proposal_mut(world, id)?.status = ProposalStatus::Queued { operation_id, eta };
        world.events.push(
            now,
            GovernanceEvent::ProposalQueued {
                id: *id,
                operation_id,
                eta,
            },
        );
        info!(%id, %operation_id, eta, "proposal queued");
        Ok(eta)
    }

    /// Run a Queued proposal's calls through the timelock and treasury.
    pub fn execute(
        &self,
        world: &mut World,
        id: &ProposalId,
        effects: &mut dyn CallEffects,
    ) -> GovernorResult<BatchReceipt> {
        let proposal = self.proposal(world, id)?;
        let (operation_id, eta) = match (self.derive_state(world, proposal)?, proposal.status) {
            (ProposalState::Queued, ProposalStatus::Queued { operation_id, eta }) => {
                (operation_id, eta)
            }
            (ProposalState::Executed, _) => return Err(GovernorError::AlreadyExecuted(*id)),
            (ProposalState::Expired, _) => return Err(GovernorError::OperationExpired(*id)),
            (state, _) => return Err(GovernorError::ProposalNotQueued { state }),
        };
        let calls = proposal.calls.clone();

        let now = world.now;
        let receipt =
            world
                .timelock
                .execute(&operation_id, &calls, &mut world.treasury, effects, now)?;

        self.proposal_mut(world, id)?.status = ProposalStatus::Executed {
            operation_id,
            eta,
            at: now,
        };
        world
            .events
            .push(now, GovernanceEvent::ProposalExecuted { id: *id });
        info!(%id, %operation_id, calls = calls.len(), "proposal executed");
        Ok(receipt)
    }

    pub fn proposal<'w>(&self, world: &'w World, id: &ProposalId) -> GovernorResult<&'w Proposal> {
        world
            .proposals
            .get(id)
            .ok_or(GovernorError::UnknownProposal(*id))
    }

    fn proposal_mut<'w>(
        &self,
        world: &'w mut World,
        id: &ProposalId,
    ) -> GovernorResult<&'w mut Proposal> {
        world
            .proposals
            .get_mut(id)
            .ok_or(GovernorError::UnknownProposal(*id))
    }

    pub fn proposal_votes(&self, world: &World, id: &ProposalId) -> GovernorResult<Tally> {
        Ok(self.proposal(world, id)?.tally)
    }

    pub fn proposal_snapshot(&self, world: &World, id: &ProposalId) -> GovernorResult<Sequence> {
        Ok(self.proposal(world, id)?.snapshot)
    }

    pub fn proposal_deadline(&self, world: &World, id: &ProposalId) -> GovernorResult<Sequence> {
        Ok(self.proposal(world, id)?.deadline)
    }

    pub fn proposal_proposer(&self, world: &World, id: &ProposalId) -> GovernorResult<Address> {
        Ok(self.proposal(world, id)?.proposer)
    }

    /// Timelock eta once queued.
    pub fn proposal_eta(&self, world: &World, id: &ProposalId) -> GovernorResult<Option<Sequence>> {
        Ok(self.proposal(world, id)?.eta())
    }

    pub fn has_voted(&self, world: &World, id: &ProposalId, voter: &Address) -> GovernorResult<bool> {
        Ok(self.proposal(world, id)?.has_voted(voter))
    }

    pub fn receipt(
        &self,
        world: &World,
        id: &ProposalId,
        voter: &Address,
    ) -> GovernorResult<Option<VoteReceipt>> {
        Ok(self.proposal(world, id)?.receipt(voter).copied())
    }
}
