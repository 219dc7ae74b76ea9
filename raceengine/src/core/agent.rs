use crate::core::strategy::StrategyKind;
use crate::core::track::{Track, Waypoint};
use serde::{Deserialize, Serialize};

/// Colours handed out to agents that do not bring their own.
pub const DEFAULT_COLORS: [&str; 6] = [
    "#00FFD1", "#FF4D4D", "#FFD700", "#7B61FF", "#FF8C00", "#3DDC84",
];

/// * `id` - Unique agent id (optional, assigned from the list position when missing). Labels such
///   as `"CAR_3"` are accepted and keep their trailing number.
/// * `name` - Display name, e.g. AlphaBot
/// * `strategy` - Driving strategy for the whole run
/// * `color` - CSS colour used by the dashboard
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AgentPars {
    #[serde(default, deserialize_with = "agent_id")]
    pub id: Option<u32>,
    pub name: String,
    #[serde(default, alias = "personality")]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AgentId {
    Number(u32),
    Label(String),
}

fn agent_id<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let id = match Option::<AgentId>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(AgentId::Number(id)) => id,
        Some(AgentId::Label(label)) => {
            let digits = label.trim_start_matches(|c: char| !c.is_ascii_digit());
            match digits.parse::<u32>() {
                Ok(id) => id,
                Err(_) => {
                    return Err(serde::de::Error::custom(format!(
                        "agent id {:?} carries no number",
                        label
                    )))
                }
            }
        }
    };
    Ok(Some(id))
}

impl AgentPars {
    pub fn new(name: &str, strategy: StrategyKind) -> AgentPars {
        AgentPars {
            id: None,
            name: name.to_owned(),
            strategy,
            color: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Warning,
    Pit,
    Finished,
}

/// Telemetry gauges, each in [0, 100].
/// * `battery` - (%) State of charge
/// * `engine_temp` - (°C) Engine temperature
/// * `tire_wear` - (%) Remaining tread, 100 is a fresh set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub battery: f64,
    pub engine_temp: f64,
    pub tire_wear: f64,
}

impl Default for Health {
    fn default() -> Self {
        Health {
            battery: 100.0,
            engine_temp: 60.0,
            tire_wear: 100.0,
        }
    }
}

impl Health {
    pub fn clamp(&mut self) {
        self.battery = self.battery.clamp(0.0, 100.0);
        self.engine_temp = self.engine_temp.clamp(0.0, 100.0);
        self.tire_wear = self.tire_wear.clamp(0.0, 100.0);
    }

    pub fn is_finite(&self) -> bool {
        self.battery.is_finite() && self.engine_temp.is_finite() && self.tire_wear.is_finite()
    }
}

/// Agent is the complete mutable record of one competitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agent {
    pub id: u32,
    pub name: String,
    pub color: String,
    pub strategy: StrategyKind,
    pub position: Waypoint,
    /// (deg) in [0, 360)
    pub heading: f64,
    /// (m/s)
    pub speed: f64,
    /// (m) lateral offset from the centreline, positive to the left
    pub lane_offset: f64,
    /// lap fraction in [0, 1)
    pub progress: f64,
    pub lap: u32,
    pub lap_start_time: f64,
    pub last_lap_time: Option<f64>,
    pub best_lap_time: Option<f64>,
    pub lap_times: Vec<f64>,
    pub cumulative_time: f64,
    pub cumulative_tire_wear: f64,
    pub status: AgentStatus,
    pub health: Health,
    pub pit_stops: u32,
    pub pit_time_left: f64,
    /// (s) Remaining time of an engine failure, the engine delivers no power while positive
    pub engine_failure_left: f64,
    /// (s) Remaining time of a control impairment
    pub control_impairment_left: f64,
    pub finish_time: Option<f64>,
    pub finish_position: Option<u32>,
    pub frozen: bool,
    /// Unprojected lap fraction of the racing line the agent follows.
    #[serde(skip)]
    pub(crate) line_fraction: f64,
    #[serde(skip)]
    pub(crate) lap_armed: bool,
}

impl Agent {
    /// new places an agent at the given lap fraction on the racing line, at rest at the minimum
    /// speed with fresh health.
    pub fn new(
        id: u32,
        agent_pars: &AgentPars,
        color: &str,
        start_progress: f64,
        track: &Track,
        min_speed: f64,
    ) -> Agent {
        let (position, heading) = track.point_at(start_progress);

        Agent {
            id,
            name: agent_pars.name.to_owned(),
            color: color.to_owned(),
            strategy: agent_pars.strategy,
            position,
            heading,
            speed: min_speed,
            lane_offset: 0.0,
            progress: track.progress_at(&position),
            lap: 0,
            lap_start_time: 0.0,
            last_lap_time: None,
            best_lap_time: None,
            lap_times: Vec::new(),
            cumulative_time: 0.0,
            cumulative_tire_wear: 0.0,
            status: AgentStatus::Active,
            health: Health::default(),
            pit_stops: 0,
            pit_time_left: 0.0,
            engine_failure_left: 0.0,
            control_impairment_left: 0.0,
            finish_time: None,
            finish_position: None,
            frozen: false,
            line_fraction: start_progress.rem_euclid(1.0),
            lap_armed: false,
        }
    }

    /// race_progress returns completed laps plus the current lap fraction.
    pub fn race_progress(&self) -> f64 {
        self.lap as f64 + self.progress
    }

    pub fn engine_failed(&self) -> bool {
        self.engine_failure_left > 0.0
    }

    pub fn control_impaired(&self) -> bool {
        self.control_impairment_left > 0.0
    }

    /// is_moving is false for finished and frozen agents, which the stepper leaves untouched.
    pub fn is_moving(&self) -> bool {
        self.status != AgentStatus::Finished && !self.frozen
    }
}
