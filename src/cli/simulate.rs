//! Scenario simulator.
//!
//! Replays a scripted list of steps against a world and prints the resulting
//! event log and proposal states as JSON.
//!
//! ```toml
//! owner = "0x0000000000000000000000000000000000000001"
//! reverting_targets = []
//!
//! [[step]]
//! op = "transfer"
//! from = "0x0000000000000000000000000000000000000001"
//! to = "0x0000000000000000000000000000000000000002"
//! amount = "15000000000000000000000"
//!
//! [[step]]
//! op = "propose"
//! label = "grant"
//! proposer = "0x0000000000000000000000000000000000000002"
//! description = "Pay voter one token"
//! calls = [{ target = "0x0000000000000000000000000000000000000003", value = "1000000000000000000" }]
//! ```
//!
//! Proposals are referred to by the label given at `propose`, or by their
//! 0x-hex id when resuming from a saved state.

use super::config::AgoraConfig;
use agora::governor::events::EventRecord;
use agora::governor::proposal::{ProposalState, Tally};
use agora::governor::Governor;
use agora::treasury::effects::RecordingEffects;
use agora::treasury::Call;
use agora::types::{amount_str, Address, Amount, ProposalId, Sequence};
use agora::world::{deploy, World};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// A scripted scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Deployer; receives the initial supply.
    pub owner: Address,

    /// Call targets whose effects always revert.
    #[serde(default)]
    pub reverting_targets: Vec<Address>,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// A call as written in a scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct CallSpec {
    pub target: Address,
    #[serde(default, with = "amount_str")]
    pub value: Amount,
    #[serde(default)]
    pub payload: String,
}

impl CallSpec {
    fn to_call(&self) -> Result<Call, String> {
        let payload = self.payload.strip_prefix("0x").unwrap_or(&self.payload);
        let payload = hex::decode(payload).map_err(|e| format!("invalid payload: {}", e))?;
        Ok(Call {
            target: self.target,
            value: self.value,
            payload,
        })
    }
}

/// One scenario step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Mint {
        to: Address,
        #[serde(with = "amount_str")]
        amount: Amount,
    },
    Burn {
        from: Address,
        #[serde(with = "amount_str")]
        amount: Amount,
    },
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "amount_str")]
        amount: Amount,
    },
    Delegate {
        account: Address,
        delegatee: Address,
    },
    Deposit {
        from: Address,
        #[serde(with = "amount_str")]
        amount: Amount,
    },
    Advance {
        by: Sequence,
    },
    Propose {
        label: String,
        proposer: Address,
        description: String,
        calls: Vec<CallSpec>,
    },
    Vote {
        proposal: String,
        voter: Address,
        support: u8,
        #[serde(default)]
        reason: String,
    },
    Queue {
        proposal: String,
    },
    Execute {
        proposal: String,
    },
    Cancel {
        proposal: String,
        caller: Address,
    },
    /// Fail the scenario unless the proposal is in `expect`.
    State {
        proposal: String,
        expect: ProposalState,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "mint",
            Self::Burn { .. } => "burn",
            Self::Transfer { .. } => "transfer",
            Self::Delegate { .. } => "delegate",
            Self::Deposit { .. } => "deposit",
            Self::Advance { .. } => "advance",
            Self::Propose { .. } => "propose",
            Self::Vote { .. } => "vote",
            Self::Queue { .. } => "queue",
            Self::Execute { .. } => "execute",
            Self::Cancel { .. } => "cancel",
            Self::State { .. } => "state",
        }
    }
}

/// Simulation errors.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("failed to deploy: {0}")]
    Deploy(String),

    #[error("step {index} ({op}) failed: {message}")]
    Step {
        index: usize,
        op: &'static str,
        message: String,
    },
}

/// Summary of one proposal at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalSummary {
    pub id: ProposalId,
    pub state: ProposalState,
    pub tally: Tally,
}

/// Result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub now: Sequence,
    #[serde(with = "amount_str")]
    pub treasury_balance: Amount,
    pub proposals: BTreeMap<String, ProposalSummary>,
    pub events: Vec<EventRecord>,
}

/// Replays scenario steps against one world.
pub struct Simulator {
    world: World,
    governor: Governor,
    effects: RecordingEffects,
    labels: BTreeMap<String, ProposalId>,
}

impl Simulator {
    /// Fresh deployment from `config` owned by the scenario's owner.
    pub fn deploy(config: &AgoraConfig, scenario: &Scenario) -> Result<Self, SimulationError> {
        let deployment = deploy(&config.deploy_params(), scenario.owner)
            .map_err(|e| SimulationError::Deploy(e.to_string()))?;
        Ok(Self::resume(deployment.world, scenario))
    }

    /// Continue from a previously saved world under its own governor settings.
    pub fn resume(world: World, scenario: &Scenario) -> Self {
        let governor = world.governor();
        let mut effects = RecordingEffects::new();
        for target in &scenario.reverting_targets {
            effects.revert_on(*target);
        }
        Self {
            world,
            governor,
            effects,
            labels: BTreeMap::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn run(&mut self, steps: &[Step]) -> Result<(), SimulationError> {
        for (index, step) in steps.iter().enumerate() {
            self.apply(step).map_err(|message| SimulationError::Step {
                index,
                op: step.name(),
                message,
            })?;
        }
        Ok(())
    }

    fn resolve(&self, reference: &str) -> Result<ProposalId, String> {
        if let Some(id) = self.labels.get(reference) {
            return Ok(*id);
        }
        reference
            .parse()
            .map(ProposalId)
            .map_err(|_| format!("unknown proposal '{}'", reference))
    }

    fn apply(&mut self, step: &Step) -> Result<(), String> {
        let world = &mut self.world;
        match step {
            Step::Mint { to, amount } => world.mint(*to, *amount).map_err(|e| e.to_string()),
            Step::Burn { from, amount } => world.burn(*from, *amount).map_err(|e| e.to_string()),
            Step::Transfer { from, to, amount } => world
                .transfer(*from, *to, *amount)
                .map_err(|e| e.to_string()),
            Step::Delegate { account, delegatee } => world
                .delegate(*account, *delegatee)
                .map_err(|e| e.to_string()),
            Step::Deposit { from, amount } => world
                .treasury
                .deposit(*from, *amount)
                .map_err(|e| e.to_string()),
            Step::Advance { by } => {
                world.advance(*by);
                Ok(())
            }
            Step::Propose {
                label,
                proposer,
                description,
                calls,
            } => {
                let calls = calls
                    .iter()
                    .map(CallSpec::to_call)
                    .collect::<Result<Vec<_>, _>>()?;
                let id = self
                    .governor
                    .propose(&mut self.world, *proposer, calls, description)
                    .map_err(|e| e.to_string())?;
                self.labels.insert(label.clone(), id);
                Ok(())
            }
            Step::Vote {
                proposal,
                voter,
                support,
                reason,
            } => {
                let id = self.resolve(proposal)?;
                self.governor
                    .cast_vote_with_reason(&mut self.world, *voter, &id, *support, reason)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            Step::Queue { proposal } => {
                let id = self.resolve(proposal)?;
                self.governor
                    .queue(&mut self.world, &id)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            Step::Execute { proposal } => {
                let id = self.resolve(proposal)?;
                self.governor
                    .execute(&mut self.world, &id, &mut self.effects)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            Step::Cancel { proposal, caller } => {
                let id = self.resolve(proposal)?;
                self.governor
                    .cancel(&mut self.world, *caller, &id)
                    .map_err(|e| e.to_string())
            }
            Step::State { proposal, expect } => {
                let id = self.resolve(proposal)?;
                let state = self
                    .governor
                    .state(&self.world, &id)
                    .map_err(|e| e.to_string())?;
                if state != *expect {
                    return Err(format!("expected {}, found {}", expect, state));
                }
                Ok(())
            }
        }
    }

    /// Snapshot of the world for output.
    pub fn report(&self) -> Result<SimulationReport, String> {
        let mut proposals = BTreeMap::new();
        for (label, id) in &self.labels {
            let state = self
                .governor
                .state(&self.world, id)
                .map_err(|e| e.to_string())?;
            let tally = self
                .governor
                .proposal_votes(&self.world, id)
                .map_err(|e| e.to_string())?;
            proposals.insert(
                label.clone(),
                ProposalSummary {
                    id: *id,
                    state,
                    tally,
                },
            );
        }
        Ok(SimulationReport {
            now: self.world.now,
            treasury_balance: self.world.treasury.balance(),
            proposals,
            events: self.world.events.entries().to_vec(),
        })
    }
}

/// Run `scenario_path`, optionally resuming from and saving to `state_path`.
pub fn execute(
    scenario_path: &Path,
    config: &AgoraConfig,
    state_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(scenario_path).map_err(|e| {
        format!(
            "Failed to read scenario '{}': {}",
            scenario_path.display(),
            e
        )
    })?;
    let scenario: Scenario = toml::from_str(&contents).map_err(|e| {
        format!(
            "Failed to parse scenario '{}': {}",
            scenario_path.display(),
            e
        )
    })?;

    let mut simulator = match state_path {
        Some(path) if path.exists() => {
            let bytes = fs::read(path)
                .map_err(|e| format!("Failed to read state '{}': {}", path.display(), e))?;
            let world = World::from_bytes(&bytes)?;
            if world.settings != config.governor {
                warn!(
                    path = %path.display(),
                    "config [governor] differs from the saved state; keeping the saved settings"
                );
            }
            info!(path = %path.display(), now = world.now, "resumed world state");
            Simulator::resume(world, &scenario)
        }
        _ => Simulator::deploy(config, &scenario)?,
    };

    simulator.run(&scenario.steps)?;
    info!(steps = scenario.steps.len(), now = simulator.world().now, "scenario complete");

    if let Some(path) = state_path {
        fs::write(path, simulator.world().to_bytes()?)
            .map_err(|e| format!("Failed to write state '{}': {}", path.display(), e))?;
    }

    let report = simulator.report()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
