use crate::core::agent::{Agent, AgentPars, DEFAULT_COLORS};
use crate::core::track::Track;
use crate::error::SimError;
use std::collections::{BTreeMap, HashSet};

/// (m) Distance between two grid slots.
pub const GRID_SPACING: f64 = 8.0;

/// AgentStore owns the agent records of one race. Iteration is always in ascending id order.
#[derive(Debug, Clone, Default)]
pub struct AgentStore {
    agents: BTreeMap<u32, Agent>,
}

/// resolve_agent_ids returns the id of every configured agent: the explicit id if given,
/// otherwise the 1-based list position.
pub fn resolve_agent_ids(agent_pars: &[AgentPars]) -> Vec<u32> {
    agent_pars
        .iter()
        .enumerate()
        .map(|(i, pars)| pars.id.unwrap_or(i as u32 + 1))
        .collect()
}

impl AgentStore {
    /// from_pars validates the agent list and grids all agents, pole position first. The pole
    /// sitter starts furthest ahead of the line so nobody crosses it before driving a lap.
    pub fn from_pars(
        agent_pars: &[AgentPars],
        track: &Track,
        min_speed: f64,
    ) -> Result<AgentStore, SimError> {
        if agent_pars.is_empty() {
            return Err(SimError::config("The agent list is empty!"));
        }

        let mut names = HashSet::with_capacity(agent_pars.len());
        for pars in agent_pars.iter() {
            if pars.name.trim().is_empty() {
                return Err(SimError::config("Agent names must not be empty!"));
            }
            if !names.insert(pars.name.as_str()) {
                return Err(SimError::config(format!(
                    "Duplicate agent name {}!",
                    pars.name
                )));
            }
        }

        // keep the whole grid within the first quarter of the lap
        let no_agents = agent_pars.len();
        let spacing = GRID_SPACING.min(0.25 * track.length / no_agents as f64);

        let mut store = AgentStore::default();
        for (slot, (pars, id)) in agent_pars
            .iter()
            .zip(resolve_agent_ids(agent_pars))
            .enumerate()
        {
            let start_progress = (no_agents - 1 - slot) as f64 * spacing / track.length;
            store.create(id, pars, slot, start_progress, track, min_speed)?;
        }

        Ok(store)
    }

    /// create adds a single agent; `slot` picks the default colour.
    pub fn create(
        &mut self,
        id: u32,
        agent_pars: &AgentPars,
        slot: usize,
        start_progress: f64,
        track: &Track,
        min_speed: f64,
    ) -> Result<&Agent, SimError> {
        if self.agents.contains_key(&id) {
            return Err(SimError::config(format!("Duplicate agent id {}!", id)));
        }

        let color = match &agent_pars.color {
            Some(color) => color.to_owned(),
            None => DEFAULT_COLORS[slot % DEFAULT_COLORS.len()].to_owned(),
        };
        color.parse::<css_color_parser::Color>().map_err(|_| {
            SimError::config(format!(
                "Could not parse color {} of agent {}!",
                color, agent_pars.name
            ))
        })?;

        let agent = Agent::new(id, agent_pars, &color, start_progress, track, min_speed);
        Ok(self.agents.entry(id).or_insert(agent))
    }

    pub fn get(&self, id: u32) -> Result<&Agent, SimError> {
        self.agents.get(&id).ok_or(SimError::NotFound(id))
    }

    pub fn all(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.agents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// update runs the mutator on a working copy and commits it only if the mutator succeeds,
    /// so a failed mutation leaves the stored record untouched.
    pub fn update<R, F>(&mut self, id: u32, mutator: F) -> Result<R, SimError>
    where
        F: FnOnce(&mut Agent) -> Result<R, SimError>,
    {
        let stored = self.agents.get_mut(&id).ok_or(SimError::NotFound(id))?;
        let mut working = stored.clone();
        let out = mutator(&mut working)?;
        *stored = working;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::AgentStatus;
    use crate::core::strategy::StrategyKind;

    fn pars() -> Vec<AgentPars> {
        vec![
            AgentPars::new("AlphaBot", StrategyKind::Aggressive),
            AgentPars::new("BetaBot", StrategyKind::Balanced),
            AgentPars::new("GammaBot", StrategyKind::Conservative),
        ]
    }

    #[test]
    fn grids_agents_with_fresh_state() {
        let track = Track::builtin("monaco").unwrap();
        let store = AgentStore::from_pars(&pars(), &track, 5.0).unwrap();

        assert_eq!(store.ids(), vec![1, 2, 3]);
        let pole = store.get(1).unwrap();
        let last = store.get(3).unwrap();
        assert!(pole.progress > last.progress);
        assert_eq!(last.progress, 0.0);
        for agent in store.all() {
            assert_eq!(agent.lap, 0);
            assert_eq!(agent.status, AgentStatus::Active);
            assert_eq!(agent.speed, 5.0);
            assert_eq!(agent.health.tire_wear, 100.0);
        }
        assert_eq!(pole.color, DEFAULT_COLORS[0]);
    }

    #[test]
    fn rejects_bad_agent_lists() {
        let track = Track::builtin("monaco").unwrap();
        assert!(matches!(
            AgentStore::from_pars(&[], &track, 5.0),
            Err(SimError::Configuration(_))
        ));

        let mut dup_id = pars();
        dup_id[0].id = Some(2);
        assert!(AgentStore::from_pars(&dup_id, &track, 5.0).is_err());

        let mut dup_name = pars();
        dup_name[2].name = "AlphaBot".to_owned();
        assert!(AgentStore::from_pars(&dup_name, &track, 5.0).is_err());

        let mut bad_color = pars();
        bad_color[1].color = Some("definitely-not-a-colour".to_owned());
        assert!(AgentStore::from_pars(&bad_color, &track, 5.0).is_err());
    }

    #[test]
    fn failed_updates_are_not_committed() {
        let track = Track::builtin("square").unwrap();
        let mut store = AgentStore::from_pars(&pars(), &track, 5.0).unwrap();

        let res: Result<(), SimError> = store.update(2, |agent| {
            agent.speed = 99.0;
            Err(SimError::invalid_state("nope"))
        });
        assert!(res.is_err());
        assert_eq!(store.get(2).unwrap().speed, 5.0);

        store
            .update(2, |agent| {
                agent.speed = 7.0;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.get(2).unwrap().speed, 7.0);

        assert_eq!(store.get(42).unwrap_err(), SimError::NotFound(42));
        assert_eq!(
            store.update(42, |_| Ok(())).unwrap_err(),
            SimError::NotFound(42)
        );
    }
}
