//! Governance event log.
//!
//! - Append-only (no deletion)
//! - Ordered by admission; each record carries the sequence it happened at
//! - Query helpers for indexers and the simulator

use super::proposal::VoteType;
use crate::types::{Address, Amount, DescriptionHash, OperationId, ProposalId, Sequence};
use serde::{Deserialize, Serialize};

/// Externally observable governance event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GovernanceEvent {
    ProposalCreated {
        id: ProposalId,
        proposer: Address,
        description_hash: DescriptionHash,
        description: String,
        snapshot: Sequence,
        deadline: Sequence,
    },
    VoteCast {
        voter: Address,
        id: ProposalId,
        support: VoteType,
        #[serde(with = "crate::types::amount_str")]
        weight: Amount,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        reason: String,
    },
    ProposalQueued {
        id: ProposalId,
        operation_id: OperationId,
        eta: Sequence,
    },
    ProposalExecuted {
        id: ProposalId,
    },
    ProposalCanceled {
        id: ProposalId,
    },
}

impl GovernanceEvent {
    pub fn proposal_id(&self) -> &ProposalId {
        match self {
            Self::ProposalCreated { id, .. }
            | Self::VoteCast { id, .. }
            | Self::ProposalQueued { id, .. }
            | Self::ProposalExecuted { id }
            | Self::ProposalCanceled { id } => id,
        }
    }
}

/// An event with the sequence it was emitted at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: Sequence,
    #[serde(flatten)]
    pub event: GovernanceEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, sequence: Sequence, event: GovernanceEvent) {
        self.entries.push(EventRecord { sequence, event });
    }

    pub fn entries(&self) -> &[EventRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Events about one proposal, in emission order.
    pub fn for_proposal<'a>(
        &'a self,
        id: &'a ProposalId,
    ) -> impl Iterator<Item = &'a EventRecord> + 'a {
        self.entries
            .iter()
            .filter(move |r| r.event.proposal_id() == id)
    }

    /// Events emitted at or after `sequence`.
    pub fn since(&self, sequence: Sequence) -> impl Iterator<Item = &EventRecord> {
        self.entries.iter().filter(move |r| r.sequence >= sequence)
    }
}
