//! Effect capability for the treasury executor.
//!
//! The executor never interprets a call's payload. Everything beyond the
//! native value transfer is handed to a [`CallEffects`] implementation, which
//! must be able to stage work and then either commit or roll it back as a unit.

use super::Call;
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Why a single call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CallError {
    #[error("insufficient treasury balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Amount, requested: Amount },

    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("value overflow")]
    Overflow,
}

/// Transactional effect executor.
///
/// The treasury calls `begin` once per batch, `invoke` once per call in
/// order, then exactly one of `commit` or `rollback`. Effects staged by
/// `invoke` must not be observable until `commit`.
pub trait CallEffects {
    fn begin(&mut self);

    /// Perform the opaque part of `call`, returning its raw result.
    fn invoke(&mut self, call: &Call) -> Result<Vec<u8>, CallError>;

    fn commit(&mut self);

    fn rollback(&mut self);
}

/// A call that reached the effect layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokedCall {
    pub target: Address,
    pub value: Amount,
    pub payload: Vec<u8>,
}

/// Journaling [`CallEffects`] that records every committed call.
///
/// Targets registered with [`RecordingEffects::revert_on`] fail every call;
/// targets registered with [`RecordingEffects::respond`] return a fixed
/// result. Used by the simulator and by tests to observe exactly which calls
/// took effect.
#[derive(Debug, Clone, Default)]
pub struct RecordingEffects {
    committed: Vec<InvokedCall>,
    staged: Vec<InvokedCall>,
    reverting: BTreeSet<Address>,
    responses: BTreeMap<Address, Vec<u8>>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `target` revert.
    pub fn revert_on(&mut self, target: Address) -> &mut Self {
        self.reverting.insert(target);
        self
    }

    /// Return `result` from every call to `target`.
    pub fn respond(&mut self, target: Address, result: Vec<u8>) -> &mut Self {
        self.responses.insert(target, result);
        self
    }

    /// Calls whose effects were committed, in execution order.
    pub fn committed(&self) -> &[InvokedCall] {
        &self.committed
    }
}

impl CallEffects for RecordingEffects {
    fn begin(&mut self) {
        self.staged.clear();
    }

    fn invoke(&mut self, call: &Call) -> Result<Vec<u8>, CallError> {
        if self.reverting.contains(&call.target) {
            return Err(CallError::Reverted(format!(
                "target {} rejected the call",
                call.target
            )));
        }
        self.staged.push(InvokedCall {
            target: call.target,
            value: call.value,
            payload: call.payload.clone(),
        });
        Ok(self.responses.get(&call.target).cloned().unwrap_or_default())
    }

    fn commit(&mut self) {
        self.committed.append(&mut self.staged);
    }

    fn rollback(&mut self) {
        self.staged.clear();
    }
}
