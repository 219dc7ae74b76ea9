use crate::core::agent::Agent;
use crate::core::director::Weather;
use crate::core::engine::SimStatus;
use crate::core::event_log::Event;
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Agent record together with its place in the standings.
/// * `rank` - 1-based position
/// * `gap_to_leader` - (s) Estimated time gap to the leader, 0.0 for the leader itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedAgent {
    pub rank: u32,
    pub gap_to_leader: f64,
    pub agent: Agent,
}

/// SimulationSnapshot is the immutable world state published after every tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSnapshot {
    pub tick: u64,
    pub race_time: f64,
    pub status: SimStatus,
    pub track: Option<String>,
    pub total_laps: u32,
    pub weather: Weather,
    /// Agents in race order.
    pub agents: Vec<RankedAgent>,
    /// Retained events, oldest first.
    pub events: Vec<Event>,
}

impl SimulationSnapshot {
    /// State of an engine without any race configuration.
    pub fn empty(status: SimStatus) -> SimulationSnapshot {
        SimulationSnapshot {
            tick: 0,
            race_time: 0.0,
            status,
            track: None,
            total_laps: 0,
            weather: Weather::Dry,
            agents: vec![],
            events: vec![],
        }
    }

    pub fn agent(&self, id: u32) -> Option<&RankedAgent> {
        self.agents.iter().find(|ranked| ranked.agent.id == id)
    }

    pub fn leader(&self) -> Option<&Agent> {
        self.agents.first().map(|ranked| &ranked.agent)
    }
}

/// SnapshotCell hands the latest snapshot from the simulation loop to any number of readers.
/// Published snapshots are never mutated, readers keep theirs for as long as they like.
#[derive(Debug)]
pub struct SnapshotCell {
    inner: RwLock<Arc<SimulationSnapshot>>,
}

impl Default for SnapshotCell {
    fn default() -> Self {
        SnapshotCell::new(Arc::new(SimulationSnapshot::empty(SimStatus::Idle)))
    }
}

impl SnapshotCell {
    pub fn new(snapshot: Arc<SimulationSnapshot>) -> SnapshotCell {
        SnapshotCell {
            inner: RwLock::new(snapshot),
        }
    }

    pub fn publish(&self, snapshot: Arc<SimulationSnapshot>) {
        // a panicking reader cannot leave a half-written Arc behind
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = snapshot;
    }

    pub fn load(&self) -> Arc<SimulationSnapshot> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}
