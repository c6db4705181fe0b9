//! Agora - On-chain Governance Engine
//!
//! Token-weighted voting over proposals whose effects run through a timelock
//! into a treasury.
//!
//! Key principles:
//! - Vote weight is read at a fixed snapshot, never at vote time
//! - One ballot per account per proposal
//! - No effect runs before its timelock delay, or after its grace period
//! - Batches are atomic: all calls apply, or none do
//! - One explicit `World` value; time only moves when the caller advances it

pub mod governor;
pub mod ledger;
pub mod serialization;
pub mod timelock;
pub mod treasury;
pub mod types;
pub mod world;

pub use governor::{Governor, GovernorError, GovernorResult};
pub use types::{
    Address, Amount, DescriptionHash, Digest32, OperationId, ProposalId, Sequence, UNIT,
};
pub use world::{deploy, DeployParams, Deployment, World};
