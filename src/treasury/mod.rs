//! Treasury Executor.
//!
//! Holds the collective's native value and performs authorized call batches.
//!
//! - Only the configured executor (the timelock) may run a batch, proven by an
//!   [`ExecutorCapability`] that code outside this crate cannot construct
//! - A batch is all-or-nothing: value moves are staged in an overlay and
//!   effects are staged in the [`CallEffects`] journal until every call
//!   succeeds
//! - Balance is checked per call at execution time, not reserved up front

pub mod effects;

use crate::types::{Address, Amount, OperationId, Sequence};
use effects::{CallEffects, CallError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

/// One step of a proposal: send `value` to `target` and invoke it with
/// `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub target: Address,
    pub value: Amount,
    #[serde(default, with = "hex_bytes")]
    pub payload: Vec<u8>,
}

impl Call {
    /// Plain value transfer with no payload.
    pub fn transfer(to: Address, value: Amount) -> Self {
        Self {
            target: to,
            value,
            payload: Vec::new(),
        }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        hex::decode(text.strip_prefix("0x").unwrap_or(&text)).map_err(serde::de::Error::custom)
    }
}

/// Treasury errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreasuryError {
    #[error("{caller} is not authorized to execute treasury batches")]
    Unauthorized { caller: Address },

    #[error("call {index} reverted: {cause}")]
    ExecutionReverted { index: usize, cause: CallError },

    #[error("deposit overflows treasury balance")]
    Overflow,
}

/// Executor rights presented to [`Treasury::execute_batch`].
///
/// Minted only by the timelock while it executes a ready operation.
#[derive(Debug)]
pub struct ExecutorCapability {
    issuer: Address,
}

impl ExecutorCapability {
    pub(crate) fn new(issuer: Address) -> Self {
        Self { issuer }
    }

    pub fn issuer(&self) -> Address {
        self.issuer
    }
}

/// Treasury result type.
pub type TreasuryResult<T> = Result<T, TreasuryError>;

/// Raw results of a fully executed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub operation_id: OperationId,
    pub results: Vec<Vec<u8>>,
    pub total_value: Amount,
}

/// One entry per executed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub operation_id: OperationId,
    pub call_count: usize,
    pub total_value: Amount,
    pub executed_at: Sequence,
}

/// Native value vault plus batch executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    pub address: Address,
    executor: Address,
    balances: BTreeMap<Address, Amount>,
    executions: Vec<ExecutionRecord>,
}

impl Treasury {
    /// Treasury at `address` that only accepts batches from `executor`.
    pub fn new(address: Address, executor: Address) -> Self {
        Self {
            address,
            executor,
            balances: BTreeMap::new(),
            executions: Vec::new(),
        }
    }

    pub fn executor(&self) -> Address {
        self.executor
    }

    /// Treasury's own balance.
    pub fn balance(&self) -> Amount {
        self.balance_of(&self.address)
    }

    /// Native balance of any account paid by the treasury.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn executions(&self) -> &[ExecutionRecord] {
        &self.executions
    }

    /// Fund the treasury.
    pub fn deposit(&mut self, from: Address, amount: Amount) -> TreasuryResult<()> {
        let balance = self
            .balance()
            .checked_add(amount)
            .ok_or(TreasuryError::Overflow)?;
        self.balances.insert(self.address, balance);
        info!(%from, amount, balance, "treasury deposit");
        Ok(())
    }

    /// Execute `calls` in order on behalf of the capability's issuer.
    ///
    /// Either every call takes effect or none does.
    pub fn execute_batch(
        &mut self,
        capability: &ExecutorCapability,
        operation_id: OperationId,
        calls: &[Call],
        effects: &mut dyn CallEffects,
        now: Sequence,
    ) -> TreasuryResult<BatchReceipt> {
        if capability.issuer != self.executor {
            return Err(TreasuryError::Unauthorized {
                caller: capability.issuer,
            });
        }

        let mut overlay = Overlay::new(&self.balances);
        let mut results = Vec::with_capacity(calls.len());
        let mut total_value: Amount = 0;

        effects.begin();
        for (index, call) in calls.iter().enumerate() {
            let step = overlay
                .transfer(self.address, call.target, call.value)
                .and_then(|_| effects.invoke(call));
            match step {
                Ok(result) => {
                    results.push(result);
                    total_value = total_value.saturating_add(call.value);
                }
                Err(cause) => {
                    effects.rollback();
                    warn!(%operation_id, index, %cause, "batch reverted");
                    return Err(TreasuryError::ExecutionReverted { index, cause });
                }
            }
        }

        let staged = overlay.into_changes();
        effects.commit();
        self.balances.extend(staged);
        self.executions.push(ExecutionRecord {
            operation_id,
            call_count: calls.len(),
            total_value,
            executed_at: now,
        });
        info!(%operation_id, calls = calls.len(), total_value, "batch executed");

        Ok(BatchReceipt {
            operation_id,
            results,
            total_value,
        })
    }
}

/// Staged balance changes over a base map.
struct Overlay<'a> {
    base: &'a BTreeMap<Address, Amount>,
    changes: BTreeMap<Address, Amount>,
}

impl<'a> Overlay<'a> {
    fn new(base: &'a BTreeMap<Address, Amount>) -> Self {
        Self {
            base,
            changes: BTreeMap::new(),
        }
    }

    fn get(&self, account: &Address) -> Amount {
        self.changes
            .get(account)
            .or_else(|| self.base.get(account))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(&mut self, from: Address, to: Address, value: Amount) -> Result<(), CallError> {
        let available = self.get(&from);
        if value > available {
            return Err(CallError::InsufficientBalance {
                available,
                requested: value,
            });
        }
        if value == 0 || from == to {
            return Ok(());
        }
        let remaining = available - value;
        let credited = self.get(&to).checked_add(value).ok_or(CallError::Overflow)?;
        self.changes.insert(from, remaining);
        self.changes.insert(to, credited);
        Ok(())
    }

    fn into_changes(self) -> BTreeMap<Address, Amount> {
        self.changes
    }
}
