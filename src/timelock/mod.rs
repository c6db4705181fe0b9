//! Timelock Scheduler.
//!
//! Operations are keyed by a digest of `(calls, predecessor, salt)` and become
//! executable only inside `[eta, eta + grace_period]`. The timelock is the sole
//! holder of the treasury's [`ExecutorCapability`], so every effect passes
//! through this window.
//!
//! Writers are crate-private: scheduling and execution are reached through the
//! governor, which only hands over calls that passed a vote.

use crate::serialization::{digest_of, SerializationError};
use crate::treasury::{
    effects::CallEffects, BatchReceipt, Call, ExecutorCapability, Treasury, TreasuryError,
};
use crate::types::{Address, Digest32, OperationId, Sequence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

const OPERATION_TAG: &str = "agora.timelock.operation";

/// Timelock errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelockError {
    #[error("delay {delay} is below the minimum {minimum}")]
    DelayTooShort { delay: Sequence, minimum: Sequence },

    #[error("operation {0} is already scheduled")]
    AlreadyScheduled(OperationId),

    #[error("operation {0} was already executed")]
    AlreadyExecuted(OperationId),

    #[error("operation {0} expired")]
    OperationExpired(OperationId),

    #[error("operation {id} is not ready until {eta}")]
    NotReady { id: OperationId, eta: Sequence },

    #[error("operation {0} is not scheduled")]
    UnknownOperation(OperationId),

    #[error("predecessor {0} has not been executed")]
    PredecessorPending(OperationId),

    #[error("calls do not match operation {0}")]
    CallsMismatch(OperationId),

    #[error("operation encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Execution(#[from] TreasuryError),
}

impl From<SerializationError> for TimelockError {
    fn from(err: SerializationError) -> Self {
        TimelockError::Encoding(err.to_string())
    }
}

/// Timelock result type.
pub type TimelockResult<T> = Result<T, TimelockError>;

/// A scheduled operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockOperation {
    pub id: OperationId,
    pub predecessor: Option<OperationId>,
    pub salt: Digest32,
    pub scheduled_at: Sequence,
    pub eta: Sequence,
    pub executed: bool,
}

/// Lifecycle of an operation as seen at some sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    Unset,
    Waiting,
    Ready,
    Expired,
    Done,
}

/// Derive an operation id.
///
/// `predecessor` of zero means no dependency.
pub fn hash_operation(
    calls: &[Call],
    predecessor: Digest32,
    salt: Digest32,
) -> Result<OperationId, SerializationError> {
    digest_of(OPERATION_TAG, &(calls, predecessor, salt)).map(OperationId)
}

/// Delay-enforcing scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timelock {
    pub address: Address,
    pub min_delay: Sequence,
    pub grace_period: Sequence,
    operations: BTreeMap<OperationId, TimelockOperation>,
    /// Expired entries superseded by a later schedule of the same id.
    archive: Vec<TimelockOperation>,
}

impl Timelock {
    pub fn new(address: Address, min_delay: Sequence, grace_period: Sequence) -> Self {
        Self {
            address,
            min_delay,
            grace_period,
            operations: BTreeMap::new(),
            archive: Vec::new(),
        }
    }

    pub fn operation(&self, id: &OperationId) -> Option<&TimelockOperation> {
        self.operations.get(id)
    }

    pub fn archived(&self) -> &[TimelockOperation] {
        &self.archive
    }

    pub fn state(&self, id: &OperationId, now: Sequence) -> OperationState {
        match self.operations.get(id) {
            None => OperationState::Unset,
            Some(op) if op.executed => OperationState::Done,
            Some(op) if now < op.eta => OperationState::Waiting,
            Some(op) if now <= self.expires_at(op) => OperationState::Ready,
            Some(_) => OperationState::Expired,
        }
    }

    /// True iff `eta <= now <= eta + grace_period` and not executed.
    pub fn is_ready(&self, id: &OperationId, now: Sequence) -> bool {
        self.state(id, now) == OperationState::Ready
    }

    pub fn is_pending(&self, id: &OperationId, now: Sequence) -> bool {
        matches!(
            self.state(id, now),
            OperationState::Waiting | OperationState::Ready
        )
    }

    pub fn is_expired(&self, id: &OperationId, now: Sequence) -> bool {
        self.state(id, now) == OperationState::Expired
    }

    fn expires_at(&self, op: &TimelockOperation) -> Sequence {
        op.eta.saturating_add(self.grace_period)
    }

    /// Schedule `calls` to become ready at `now + delay`.
    ///
    /// Returns the derived operation id and its eta.
    pub(crate) fn schedule(
        &mut self,
        calls: &[Call],
        predecessor: Option<OperationId>,
        salt: Digest32,
        delay: Sequence,
        now: Sequence,
    ) -> TimelockResult<(OperationId, Sequence)> {
        if delay < self.min_delay {
            return Err(TimelockError::DelayTooShort {
                delay,
                minimum: self.min_delay,
            });
        }
        let id = hash_operation(calls, predecessor_digest(predecessor), salt)?;
        match self.state(&id, now) {
            OperationState::Done => return Err(TimelockError::AlreadyExecuted(id)),
            OperationState::Waiting | OperationState::Ready => {
                return Err(TimelockError::AlreadyScheduled(id))
            }
            OperationState::Expired => {
                if let Some(old) = self.operations.remove(&id) {
                    self.archive.push(old);
                }
            }
            OperationState::Unset => {}
        }

        let eta = now.saturating_add(delay);
        self.operations.insert(
            id,
            TimelockOperation {
                id,
                predecessor,
                salt,
                scheduled_at: now,
                eta,
                executed: false,
            },
        );
        debug!(%id, eta, "operation scheduled");
        Ok((id, eta))
    }

    /// Consume `id`. Irreversible; a second call fails.
    pub(crate) fn mark_executed(&mut self, id: &OperationId) -> TimelockResult<()> {
        let op = self
            .operations
            .get_mut(id)
            .ok_or(TimelockError::UnknownOperation(*id))?;
        if op.executed {
            return Err(TimelockError::AlreadyExecuted(*id));
        }
        op.executed = true;
        Ok(())
    }

    /// Check readiness and that `calls` hash to `id`, run them through the
    /// treasury, then consume `id`.
    pub(crate) fn execute(
        &mut self,
        id: &OperationId,
        calls: &[Call],
        treasury: &mut Treasury,
        effects: &mut dyn CallEffects,
        now: Sequence,
    ) -> TimelockResult<BatchReceipt> {
        self.ensure_ready(id, now)?;
        self.ensure_calls_match(id, calls)?;
        let capability = ExecutorCapability::new(self.address);
        let receipt = treasury.execute_batch(&capability, *id, calls, effects, now)?;
        self.mark_executed(id)?;
        info!(%id, at = now, "operation executed");
        Ok(receipt)
    }

    fn ensure_ready(&self, id: &OperationId, now: Sequence) -> TimelockResult<()> {
        let op = self
            .operations
            .get(id)
            .ok_or(TimelockError::UnknownOperation(*id))?;
        match self.state(id, now) {
            OperationState::Done => return Err(TimelockError::AlreadyExecuted(*id)),
            OperationState::Waiting => {
                return Err(TimelockError::NotReady {
                    id: *id,
                    eta: op.eta,
                })
            }
            OperationState::Expired => return Err(TimelockError::OperationExpired(*id)),
            OperationState::Ready | OperationState::Unset => {}
        }
        if let Some(pred) = &op.predecessor {
            if self.state(pred, now) != OperationState::Done {
                return Err(TimelockError::PredecessorPending(*pred));
            }
        }
        Ok(())
    }

    fn ensure_calls_match(&self, id: &OperationId, calls: &[Call]) -> TimelockResult<()> {
        let op = self
            .operations
            .get(id)
            .ok_or(TimelockError::UnknownOperation(*id))?;
        let derived = hash_operation(calls, predecessor_digest(op.predecessor), op.salt)?;
        if derived != *id {
            return Err(TimelockError::CallsMismatch(*id));
        }
        Ok(())
    }
}

fn predecessor_digest(predecessor: Option<OperationId>) -> Digest32 {
    predecessor.map_or(Digest32::ZERO, |p| p.0)
}
