use crate::core::agent::AgentPars;
use crate::core::agent_store::resolve_agent_ids;
use crate::core::director::HazardPars;
use crate::core::engine::RacePars;
use crate::core::stepper::PhysicsPars;
use crate::core::strategy::StrategyKind;
use crate::error::SimError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

/// SimPars is used to store all other parameter structs. Every section is optional in parameter
/// files and falls back to its defaults.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimPars {
    #[serde(default)]
    pub race_pars: RacePars,
    #[serde(default)]
    pub physics_pars: PhysicsPars,
    #[serde(default)]
    pub hazard_pars: HazardPars,
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentPars>,
}

impl Default for SimPars {
    fn default() -> Self {
        SimPars {
            race_pars: RacePars::default(),
            physics_pars: PhysicsPars::default(),
            hazard_pars: HazardPars::default(),
            agents: default_agents(),
        }
    }
}

/// The three bots of the default line-up.
pub fn default_agents() -> Vec<AgentPars> {
    vec![
        AgentPars::new("AlphaBot", StrategyKind::Aggressive),
        AgentPars::new("BetaBot", StrategyKind::Balanced),
        AgentPars::new("GammaBot", StrategyKind::Conservative),
    ]
}

impl SimPars {
    /// validate checks the parameter sections. Track and agents are fully checked when the race
    /// is built, since that needs the track catalog.
    pub fn validate(&self) -> Result<(), SimError> {
        self.race_pars.validate()?;
        self.physics_pars.validate()?;
        self.hazard_pars.validate()?;
        if self.agents.is_empty() {
            return Err(SimError::config("The agent list is empty!"));
        }
        let ids = self.agent_ids();
        for event in self.hazard_pars.scheduled_events.iter() {
            if let Some(id) = event.agent {
                if !ids.contains(&id) {
                    return Err(SimError::config(format!(
                        "Scheduled {:?} targets unknown agent {}!",
                        event.kind, id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Ids of the configured agents in list order.
    pub fn agent_ids(&self) -> Vec<u32> {
        resolve_agent_ids(&self.agents)
    }
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;
    Ok(pars)
}
