use crate::core::agent::{AgentPars, AgentStatus, Health};
use crate::core::director::Weather;
use crate::core::engine::SimStatus;
use crate::interfaces::snapshot::SimulationSnapshot;
use crate::pre::read_sim_pars::SimPars;
use serde::{Deserialize, Serialize};

/// Agent as shown by the dashboard.
/// * `lap_time` - (s) Running time of the current lap, `None` once finished
/// * `delta` - (s) Gap to the leader
/// * `position` - 1-based rank in the standings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    pub id: u32,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub heading: f64,
    pub speed: f64,
    pub lap: u32,
    pub lap_time: Option<f64>,
    pub delta: f64,
    pub status: AgentStatus,
    pub progress: f64,
    pub position: u32,
    pub health: HealthState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthState {
    pub battery: f64,
    pub engine_temp: f64,
    pub tire_wear: f64,
}

impl From<Health> for HealthState {
    fn from(health: Health) -> Self {
        HealthState {
            battery: health.battery,
            engine_temp: health.engine_temp,
            tire_wear: health.tire_wear,
        }
    }
}

/// Body of `GET /simulation/state` and of all control responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResponse {
    pub tick: u64,
    pub time: f64,
    pub status: SimStatus,
    pub track: Option<String>,
    pub weather: Weather,
    pub agents: Vec<AgentState>,
    pub event_log: Vec<String>,
}

impl From<&SimulationSnapshot> for StateResponse {
    fn from(snapshot: &SimulationSnapshot) -> Self {
        StateResponse {
            tick: snapshot.tick,
            time: snapshot.race_time,
            status: snapshot.status,
            track: snapshot.track.to_owned(),
            weather: snapshot.weather,
            agents: snapshot
                .agents
                .iter()
                .map(|ranked| {
                    let agent = &ranked.agent;
                    AgentState {
                        id: agent.id,
                        name: agent.name.to_owned(),
                        x: agent.position.x,
                        y: agent.position.y,
                        color: agent.color.to_owned(),
                        heading: agent.heading,
                        speed: agent.speed,
                        lap: agent.lap,
                        lap_time: match agent.status {
                            AgentStatus::Finished => None,
                            _ => Some(snapshot.race_time - agent.lap_start_time),
                        },
                        delta: ranked.gap_to_leader,
                        status: agent.status,
                        progress: agent.progress,
                        position: ranked.rank,
                        health: agent.health.into(),
                    }
                })
                .collect(),
            event_log: snapshot.events.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Body of `POST /simulation/start`. Missing fields keep the values of the base configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(default)]
    pub track: Option<String>,
    #[serde(
        default,
        alias = "total_laps",
        alias = "maxLaps",
        alias = "max_laps"
    )]
    pub total_laps: Option<u32>,
    #[serde(
        default,
        alias = "tick_duration",
        alias = "tickDt",
        alias = "tick_dt"
    )]
    pub tick_duration: Option<f64>,
    #[serde(default)]
    pub agents: Option<Vec<AgentPars>>,
}

impl StartRequest {
    pub fn apply_to(&self, base: &SimPars) -> SimPars {
        let mut sim_pars = base.to_owned();
        if let Some(track) = &self.track {
            sim_pars.race_pars.track = track.to_owned();
        }
        if let Some(total_laps) = self.total_laps {
            sim_pars.race_pars.tot_no_laps = total_laps;
        }
        if let Some(tick_duration) = self.tick_duration {
            sim_pars.race_pars.tick_duration = tick_duration;
        }
        if let Some(agents) = &self.agents {
            sim_pars.agents = agents.to_owned();
        }
        sim_pars
    }
}

/// Body of `POST /montecarlo/run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloRequest {
    /// Agent name, defaults to the first configured agent
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default = "default_runs")]
    pub runs: u32,
    #[serde(default)]
    pub config: Option<StartRequest>,
}

fn default_runs() -> u32 {
    100
}

impl Default for MonteCarloRequest {
    fn default() -> Self {
        MonteCarloRequest {
            target: None,
            runs: default_runs(),
            config: None,
        }
    }
}

/// Error body of all endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::director::HazardPars;
    use crate::core::engine::SimulationEngine;
    use crate::core::strategy::StrategyKind;

    #[test]
    fn state_matches_the_dashboard_shape() {
        let mut engine = SimulationEngine::new(42);
        engine
            .start(SimPars {
                hazard_pars: HazardPars::none(),
                ..SimPars::default()
            })
            .unwrap();
        let snapshot = engine.tick().unwrap();

        let state = StateResponse::from(snapshot.as_ref());
        assert_eq!(state.tick, 1);
        assert_eq!(state.agents.len(), 3);
        assert_eq!(state.agents[0].position, 1);
        assert_eq!(state.agents[0].delta, 0.0);
        assert_eq!(state.event_log.len(), snapshot.events.len());

        let json = serde_json::to_value(&state).unwrap();
        let agent = &json["agents"][0];
        for key in ["id", "name", "x", "y", "color", "heading", "speed", "lap", "lapTime", "delta"] {
            assert!(agent.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(agent["status"], "active");
        assert!(agent["health"].get("engineTemp").is_some());
        assert_eq!(json["status"], "running");
        assert!(json["event_log"][0].as_str().unwrap().starts_with("[t=0.0s] lap 0 INFO:"));
    }

    #[test]
    fn start_request_overrides_the_base() {
        let req: StartRequest = serde_json::from_str(
            r#"{"track": "oval", "totalLaps": 2, "agents": [{"name": "Solo", "strategy": "aggressive"}]}"#,
        )
        .unwrap();
        let pars = req.apply_to(&SimPars::default());
        assert_eq!(pars.race_pars.track, "oval");
        assert_eq!(pars.race_pars.tot_no_laps, 2);
        assert_eq!(pars.agents.len(), 1);
        assert_eq!(pars.agents[0].strategy, StrategyKind::Aggressive);
        assert_eq!(pars.race_pars.tick_duration, 0.2);

        let mc: MonteCarloRequest = serde_json::from_str(r#"{"target": "Solo"}"#).unwrap();
        assert_eq!(mc.runs, 100);
        assert!(mc.config.is_none());
    }

    #[test]
    fn start_request_accepts_snake_case_and_labelled_ids() {
        let req: StartRequest = serde_json::from_str(
            r#"{"max_laps": 2, "tick_dt": 0.1,
                "agents": [{"id": "CAR_1", "name": "One"}, {"id": 7, "name": "Seven"}]}"#,
        )
        .unwrap();
        let pars = req.apply_to(&SimPars::default());
        assert_eq!(pars.race_pars.tot_no_laps, 2);
        assert_eq!(pars.race_pars.tick_duration, 0.1);
        assert_eq!(pars.agents[0].id, Some(1));
        assert_eq!(pars.agents[1].id, Some(7));

        let req: StartRequest = serde_json::from_str(r#"{"maxLaps": 4, "tickDt": 0.5}"#).unwrap();
        assert_eq!(req.total_laps, Some(4));
        assert_eq!(req.tick_duration, Some(0.5));

        let unlabelled = serde_json::from_str::<StartRequest>(r#"{"agents": [{"id": "CAR", "name": "X"}]}"#);
        assert!(unlabelled.is_err());
    }
}
