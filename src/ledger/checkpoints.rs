//! Append-only history of a value keyed by sequence.

use crate::types::{Amount, Sequence};
use serde::{Deserialize, Serialize};

/// A recorded value change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub at_sequence: Sequence,
    pub power: Amount,
}

/// Ordered checkpoint list.
///
/// Invariant: `at_sequence` is strictly increasing. A second write at the
/// sequence of the last entry replaces that entry's value instead of
/// appending, so the list reflects the final value at each sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoints {
    entries: Vec<Checkpoint>,
}

/// Outcome of a push: the previous latest value and the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pushed {
    pub old: Amount,
    pub new: Amount,
}

impl Checkpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `power` at `at`. `at` must not precede the last entry;
    /// [`VotingLedger`](super::VotingLedger) rejects such writes before they
    /// get here.
    pub fn push(&mut self, at: Sequence, power: Amount) -> Pushed {
        let old = self.latest();
        match self.entries.last_mut() {
            Some(last) if last.at_sequence == at => last.power = power,
            Some(last) => {
                debug_assert!(last.at_sequence < at, "checkpoint written out of order");
                self.entries.push(Checkpoint {
                    at_sequence: at,
                    power,
                });
            }
            None => self.entries.push(Checkpoint {
                at_sequence: at,
                power,
            }),
        }
        Pushed { old, new: power }
    }

    /// Most recent value, zero when empty.
    pub fn latest(&self) -> Amount {
        self.entries.last().map(|c| c.power).unwrap_or(0)
    }

    /// Value of the latest entry at or before `at`, zero if none exists.
    pub fn upper_lookup(&self, at: Sequence) -> Amount {
        // Index of the first entry strictly after `at`.
        let idx = self.entries.partition_point(|c| c.at_sequence <= at);
        if idx == 0 {
            0
        } else {
            self.entries[idx - 1].power
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter()
    }
}
