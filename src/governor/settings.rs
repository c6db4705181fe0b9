//! Governor parameters.

use crate::types::{amount_str, Amount, Sequence, UNIT};
use serde::{Deserialize, Serialize};

/// How the quorum for a proposal is computed from its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumRule {
    /// A constant number of votes.
    Fixed(#[serde(with = "amount_str")] Amount),
    /// `numerator / denominator` of total supply at the snapshot.
    Fraction { numerator: u64, denominator: u64 },
}

impl QuorumRule {
    /// Quorum given the total supply at the snapshot. Rounds down.
    pub fn apply(&self, total_supply: Amount) -> Amount {
        match *self {
            Self::Fixed(amount) => amount,
            Self::Fraction {
                numerator,
                denominator,
            } => {
                if denominator == 0 {
                    return 0;
                }
                let (n, d) = (numerator as Amount, denominator as Amount);
                // Split to keep the multiplication in range for any supply.
                (total_supply / d)
                    .saturating_mul(n)
                    .saturating_add((total_supply % d).saturating_mul(n) / d)
            }
        }
    }
}

impl Default for QuorumRule {
    fn default() -> Self {
        Self::Fraction {
            numerator: 4,
            denominator: 100,
        }
    }
}

/// Voting parameters fixed at deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorSettings {
    /// Sequences between `propose` and the vote snapshot.
    #[serde(default = "default_voting_delay")]
    pub voting_delay: Sequence,

    /// Sequences the vote stays open after the snapshot.
    #[serde(default = "default_voting_period")]
    pub voting_period: Sequence,

    /// Votes a proposer needs one sequence before proposing.
    #[serde(default = "default_proposal_threshold", with = "amount_str")]
    pub proposal_threshold: Amount,

    #[serde(default)]
    pub quorum: QuorumRule,
}

fn default_voting_delay() -> Sequence {
    1
}

fn default_voting_period() -> Sequence {
    50_400 // one week of 12s blocks
}

fn default_proposal_threshold() -> Amount {
    10_000 * UNIT
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            voting_delay: default_voting_delay(),
            voting_period: default_voting_period(),
            proposal_threshold: default_proposal_threshold(),
            quorum: QuorumRule::default(),
        }
    }
}

impl GovernorSettings {
    /// Reject parameter sets that would make every proposal unpassable.
    pub fn validate(&self) -> Result<(), String> {
        if self.voting_period == 0 {
            return Err("voting_period must be greater than zero".to_string());
        }
        if let QuorumRule::Fraction {
            numerator,
            denominator,
        } = self.quorum
        {
            if denominator == 0 {
                return Err("quorum denominator must be greater than zero".to_string());
            }
            if numerator > denominator {
                return Err("quorum fraction must not exceed 1".to_string());
            }
        }
        Ok(())
    }
}
