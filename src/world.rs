//! The single, explicitly passed world state.
//!
//! Every mutating operation takes `&mut World` and is applied in admission
//! order. Time is `World::now`, advanced only by the environment; nothing in
//! the engine ticks on its own.
//!
//! The governor settings travel with the world so a restored snapshot keeps
//! deriving proposal states under the rules they were created with.

use crate::governor::events::EventLog;
use crate::governor::settings::GovernorSettings;
use crate::governor::store::ProposalStore;
use crate::governor::Governor;
use crate::ledger::{LedgerResult, TokenInfo, VotingLedger};
use crate::serialization::{digest_of, from_cbor, to_cbor, SerializationError};
use crate::timelock::Timelock;
use crate::treasury::Treasury;
use crate::types::{Address, Amount, Sequence};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Settings, ledger, proposals, timelock, treasury and event log at one
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub now: Sequence,
    pub settings: GovernorSettings,
    pub ledger: VotingLedger,
    pub proposals: ProposalStore,
    pub timelock: Timelock,
    pub treasury: Treasury,
    pub events: EventLog,
}

impl World {
    pub fn new(
        settings: GovernorSettings,
        ledger: VotingLedger,
        timelock: Timelock,
        treasury: Treasury,
    ) -> Self {
        Self {
            now: 0,
            settings,
            ledger,
            proposals: ProposalStore::new(),
            timelock,
            treasury,
            events: EventLog::new(),
        }
    }

    /// Move time forward by `by` sequences.
    pub fn advance(&mut self, by: Sequence) {
        self.now = self.now.saturating_add(by);
    }

    /// Move time forward to `to`. Earlier targets are ignored.
    pub fn advance_to(&mut self, to: Sequence) {
        self.now = self.now.max(to);
    }

    /// Governor bound to the settings this world was deployed with.
    pub fn governor(&self) -> Governor {
        Governor::new(self.settings.clone())
    }

    /// Point `account`'s voting weight at `delegatee` as of `now`.
    pub fn delegate(&mut self, account: Address, delegatee: Address) -> LedgerResult<()> {
        self.ledger.delegate(account, delegatee, self.now)
    }

    pub fn mint(&mut self, to: Address, amount: Amount) -> LedgerResult<()> {
        self.ledger.mint(to, amount, self.now)
    }

    pub fn burn(&mut self, from: Address, amount: Amount) -> LedgerResult<()> {
        self.ledger.burn(from, amount, self.now)
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> LedgerResult<()> {
        self.ledger.transfer(from, to, amount, self.now)
    }

    /// CBOR snapshot of the whole persisted surface.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        to_cbor(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        from_cbor(bytes)
    }
}

/// Inputs for wiring a fresh governance system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployParams {
    pub token: TokenInfo,
    pub initial_supply: Amount,
    pub governor: GovernorSettings,
    pub min_delay: Sequence,
    pub grace_period: Sequence,
}

impl Default for DeployParams {
    fn default() -> Self {
        Self {
            token: TokenInfo::default(),
            initial_supply: 1_000_000 * crate::types::UNIT,
            governor: GovernorSettings::default(),
            min_delay: 2,
            grace_period: 100_800,
        }
    }
}

/// A deployed system: the world plus the governor that drives it.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub world: World,
    pub governor: Governor,
}

/// Address of a component deployed by `owner`.
pub fn component_address(owner: &Address, component: &str) -> Result<Address, SerializationError> {
    let digest = digest_of("agora.deploy", &(owner, component))?;
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest.as_bytes()[12..]);
    Ok(Address::new(bytes))
}

/// Wire token, governor, timelock and treasury together.
///
/// The initial supply is minted to `owner` at sequence 0. The treasury only
/// accepts batches from the timelock.
pub fn deploy(params: &DeployParams, owner: Address) -> Result<Deployment, DeployError> {
    params
        .governor
        .validate()
        .map_err(DeployError::InvalidSettings)?;

    let timelock_address = component_address(&owner, "timelock")?;
    let treasury_address = component_address(&owner, "treasury")?;

    let mut ledger = VotingLedger::new(params.token.clone());
    mint_initial(&mut ledger, owner, params.initial_supply)?;

    let timelock = Timelock::new(timelock_address, params.min_delay, params.grace_period);
    let treasury = Treasury::new(treasury_address, timelock_address);
    let world = World::new(params.governor.clone(), ledger, timelock, treasury);

    info!(
        %owner,
        timelock = %timelock_address,
        treasury = %treasury_address,
        supply = params.initial_supply,
        "governance system deployed"
    );

    let governor = world.governor();
    Ok(Deployment { world, governor })
}

fn mint_initial(ledger: &mut VotingLedger, owner: Address, supply: Amount) -> LedgerResult<()> {
    if supply > 0 {
        ledger.mint(owner, supply, 0)?;
    }
    Ok(())
}

/// Deployment errors.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("invalid governor settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Ledger(#[from] crate::ledger::LedgerError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerError;
    use crate::types::UNIT;

    #[test]
    fn test_deploy_wires_treasury_to_timelock() {
        let owner = Address::from_low_u64(1);
        let d = deploy(&DeployParams::default(), owner).unwrap();

        assert_eq!(d.world.treasury.executor(), d.world.timelock.address);
        assert_ne!(d.world.treasury.address, d.world.timelock.address);
        assert_eq!(d.world.ledger.balance_of(&owner), 1_000_000 * UNIT);
        assert_eq!(d.world.ledger.get_votes(&owner), 1_000_000 * UNIT);
    }

    #[test]
    fn test_deploy_rejects_invalid_settings() {
        let mut params = DeployParams::default();
        params.governor.voting_period = 0;
        assert!(matches!(
            deploy(&params, Address::from_low_u64(1)),
            Err(DeployError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut d = deploy(&DeployParams::default(), Address::from_low_u64(1)).unwrap();
        d.world.advance(12);
        d.world
            .treasury
            .deposit(Address::from_low_u64(1), 5 * UNIT)
            .unwrap();

        let bytes = d.world.to_bytes().unwrap();
        let restored = World::from_bytes(&bytes).unwrap();
        assert_eq!(restored, d.world);
    }

    #[test]
    fn test_snapshot_carries_governor_settings() {
        let mut params = DeployParams::default();
        params.governor.voting_period = 77;
        let d = deploy(&params, Address::from_low_u64(1)).unwrap();

        let restored = World::from_bytes(&d.world.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.settings, params.governor);
        assert_eq!(restored.governor().voting_period(), 77);
    }

    #[test]
    fn test_world_writes_use_current_sequence() {
        let owner = Address::from_low_u64(1);
        let holder = Address::from_low_u64(2);
        let mut d = deploy(&DeployParams::default(), owner).unwrap();
        d.world.advance(5);

        d.world.transfer(owner, holder, 10 * UNIT).unwrap();
        d.world.delegate(holder, owner).unwrap();
        assert_eq!(d.world.ledger.last_write(), 5);
        assert_eq!(d.world.ledger.get_past_votes(&holder, 5, 5).unwrap(), 0);
        assert_eq!(
            d.world.ledger.get_past_votes(&owner, 4, 5).unwrap(),
            1_000_000 * UNIT
        );

        // A stale explicit sequence is refused.
        assert_eq!(
            d.world.ledger.mint(owner, 1, 2),
            Err(LedgerError::OutOfOrder { at: 2, last: 5 })
        );
    }

    #[test]
    fn test_time_is_monotonic() {
        let mut d = deploy(&DeployParams::default(), Address::from_low_u64(1)).unwrap();
        d.world.advance_to(10);
        d.world.advance_to(3);
        assert_eq!(d.world.now, 10);
    }
}
