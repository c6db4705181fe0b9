//! Voting Power Ledger.
//!
//! Tracks token balances, the delegate each holder points at, and a
//! checkpointed history of voting power per delegatee plus one for the total
//! supply.
//!
//! - Holders that never called [`VotingLedger::delegate`] are self-delegated,
//!   so the sum of every account's power equals total supply at every sequence
//! - Delegation is single-hop: power lands on the recorded delegatee and is
//!   never forwarded along that delegatee's own delegation
//! - All history is append-only; lookups are binary searches
//! - Writes are ordered: a write at a sequence before the last one fails with
//!   [`LedgerError::OutOfOrder`] before anything changes

pub mod checkpoints;

#[cfg(test)]
mod proptests;

use crate::types::{Address, Amount, Sequence};
use checkpoints::Checkpoints;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Ledger errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("lookup at sequence {requested} is in the future (current {current})")]
    FutureLookup {
        requested: Sequence,
        current: Sequence,
    },

    #[error("the zero address cannot be a delegatee")]
    InvalidDelegatee,

    #[error("the zero address cannot hold tokens")]
    InvalidRecipient,

    #[error("{account} holds {balance}, needs {needed}")]
    InsufficientBalance {
        account: Address,
        balance: Amount,
        needed: Amount,
    },

    #[error("write at sequence {at} precedes the last write at {last}")]
    OutOfOrder { at: Sequence, last: Sequence },

    #[error("amount overflow")]
    Overflow,
}

/// Ledger result type.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Token metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for TokenInfo {
    fn default() -> Self {
        Self {
            name: "Agora Token".to_string(),
            symbol: "AGR".to_string(),
            decimals: 18,
        }
    }
}

/// Balances, delegation and voting-power history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingLedger {
    pub token: TokenInfo,
    balances: BTreeMap<Address, Amount>,
    delegates: BTreeMap<Address, Address>,
    votes: BTreeMap<Address, Checkpoints>,
    total_supply: Checkpoints,
    #[serde(default)]
    last_write: Sequence,
}

impl VotingLedger {
    pub fn new(token: TokenInfo) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Current delegatee of `account` (itself unless it delegated).
    pub fn delegates(&self, account: &Address) -> Address {
        self.delegates.get(account).copied().unwrap_or(*account)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply.latest()
    }

    /// Latest voting power of `account`.
    pub fn get_votes(&self, account: &Address) -> Amount {
        self.votes.get(account).map(|c| c.latest()).unwrap_or(0)
    }

    /// Voting power of `account` as of `at`.
    ///
    /// Fails with [`LedgerError::FutureLookup`] when `at` is after `now`.
    pub fn get_past_votes(
        &self,
        account: &Address,
        at: Sequence,
        now: Sequence,
    ) -> LedgerResult<Amount> {
        ensure_not_future(at, now)?;
        Ok(self
            .votes
            .get(account)
            .map(|c| c.upper_lookup(at))
            .unwrap_or(0))
    }

    /// Total supply as of `at`.
    pub fn total_supply_at(&self, at: Sequence, now: Sequence) -> LedgerResult<Amount> {
        ensure_not_future(at, now)?;
        Ok(self.total_supply.upper_lookup(at))
    }

    /// Full checkpoint history of `account`.
    pub fn checkpoints(&self, account: &Address) -> Option<&Checkpoints> {
        self.votes.get(account)
    }

    /// Sequence of the latest successful write.
    pub fn last_write(&self) -> Sequence {
        self.last_write
    }

    /// Accounts that have ever held voting power.
    pub fn power_holders(&self) -> impl Iterator<Item = &Address> {
        self.votes.keys()
    }

    /// Point `account`'s voting weight at `delegatee`.
    pub fn delegate(
        &mut self,
        account: Address,
        delegatee: Address,
        now: Sequence,
    ) -> LedgerResult<()> {
        self.ensure_in_order(now)?;
        if delegatee.is_zero() {
            return Err(LedgerError::InvalidDelegatee);
        }
        let old = self.delegates(&account);
        let weight = self.balance_of(&account);

        self.move_voting_power(old, delegatee, weight, now)?;
        if delegatee == account {
            self.delegates.remove(&account);
        } else {
            self.delegates.insert(account, delegatee);
        }
        self.last_write = now;

        debug!(%account, from = %old, to = %delegatee, "delegate changed");
        Ok(())
    }

    /// Create `amount` new tokens for `to`.
    pub fn mint(&mut self, to: Address, amount: Amount, now: Sequence) -> LedgerResult<()> {
        self.ensure_in_order(now)?;
        if to.is_zero() {
            return Err(LedgerError::InvalidRecipient);
        }
        let supply = self
            .total_supply()
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let delegatee = self.delegates(&to);
        self.check_credit(&delegatee, amount)?;

        self.total_supply.push(now, supply);
        self.balances.insert(to, balance);
        self.credit(delegatee, amount, now)?;
        self.last_write = now;
        Ok(())
    }

    /// Destroy `amount` of `from`'s tokens.
    pub fn burn(&mut self, from: Address, amount: Amount, now: Sequence) -> LedgerResult<()> {
        self.ensure_in_order(now)?;
        let balance = self.debit_balance_checked(&from, amount)?;
        let supply = self
            .total_supply()
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow)?;

        self.total_supply.push(now, supply);
        self.balances.insert(from, balance);
        let delegatee = self.delegates(&from);
        self.debit(delegatee, amount, now)?;
        self.last_write = now;
        Ok(())
    }

    /// Move `amount` tokens (and their voting weight) from `from` to `to`.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
        now: Sequence,
    ) -> LedgerResult<()> {
        self.ensure_in_order(now)?;
        if to.is_zero() {
            return Err(LedgerError::InvalidRecipient);
        }
        let from_balance = self.debit_balance_checked(&from, amount)?;
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let (src, dst) = (self.delegates(&from), self.delegates(&to));

        self.move_voting_power(src, dst, amount, now)?;
        self.balances.insert(from, from_balance);
        self.balances.insert(to, to_balance);
        self.last_write = now;
        Ok(())
    }

    fn ensure_in_order(&self, now: Sequence) -> LedgerResult<()> {
        if now < self.last_write {
            return Err(LedgerError::OutOfOrder {
                at: now,
                last: self.last_write,
            });
        }
        Ok(())
    }

    fn debit_balance_checked(&self, account: &Address, amount: Amount) -> LedgerResult<Amount> {
        let balance = self.balance_of(account);
        balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                account: *account,
                balance,
                needed: amount,
            })
    }

    fn check_credit(&self, account: &Address, amount: Amount) -> LedgerResult<()> {
        self.get_votes(account)
            .checked_add(amount)
            .map(|_| ())
            .ok_or(LedgerError::Overflow)
    }

    fn move_voting_power(
        &mut self,
        src: Address,
        dst: Address,
        amount: Amount,
        now: Sequence,
    ) -> LedgerResult<()> {
        if src == dst || amount == 0 {
            return Ok(());
        }
        self.check_credit(&dst, amount)?;
        self.debit(src, amount, now)?;
        self.credit(dst, amount, now)
    }

    fn credit(&mut self, account: Address, amount: Amount, now: Sequence) -> LedgerResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let cps = self.votes.entry(account).or_default();
        let power = cps.latest().checked_add(amount).ok_or(LedgerError::Overflow)?;
        let pushed = cps.push(now, power);
        debug!(%account, old = pushed.old, new = pushed.new, at = now, "votes changed");
        Ok(())
    }

    fn debit(&mut self, account: Address, amount: Amount, now: Sequence) -> LedgerResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let cps = self.votes.entry(account).or_default();
        let power = cps.latest().checked_sub(amount).ok_or(LedgerError::Overflow)?;
        let pushed = cps.push(now, power);
        debug!(%account, old = pushed.old, new = pushed.new, at = now, "votes changed");
        Ok(())
    }
}

fn ensure_not_future(at: Sequence, now: Sequence) -> LedgerResult<()> {
    if at > now {
        return Err(LedgerError::FutureLookup {
            requested: at,
            current: now,
        });
    }
    Ok(())
}
