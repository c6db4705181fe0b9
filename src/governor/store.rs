//! Proposal Store.
//!
//! Records are never deleted. When a terminal proposal is resubmitted under
//! the same id, the old record moves to the archive before the new one takes
//! its slot.

use super::proposal::Proposal;
use crate::types::ProposalId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalStore {
    proposals: BTreeMap<ProposalId, Proposal>,
    archive: Vec<Proposal>,
}

impl ProposalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ProposalId) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &ProposalId) -> Option<&mut Proposal> {
        self.proposals.get_mut(id)
    }

    pub fn contains(&self, id: &ProposalId) -> bool {
        self.proposals.contains_key(id)
    }

    /// Insert `proposal`, archiving any record it replaces.
    pub(crate) fn insert(&mut self, proposal: Proposal) {
        if let Some(previous) = self.proposals.insert(proposal.id, proposal) {
            self.archive.push(previous);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Superseded records, oldest first.
    pub fn archived(&self) -> &[Proposal] {
        &self.archive
    }
}
