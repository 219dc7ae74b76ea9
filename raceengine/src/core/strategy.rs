use crate::core::agent::Health;
use crate::core::track::Track;
use helpers::general::lin_interp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Curvature (rad/m) support points and the corresponding fraction of the straight-line speed a
/// neutral driver carries through the corner.
const CORNER_KAPPA: [f64; 5] = [0.0, 0.002, 0.005, 0.01, 0.02];
const CORNER_FACTOR: [f64; 5] = [1.0, 0.92, 0.8, 0.65, 0.5];

/// Relative target speed increase while attacking in the slipstream of the car ahead.
pub const SLIPSTREAM_BOOST: f64 = 0.06;

/// Engine temperature (°C) above which cautious drivers lift.
const HEAT_CAUTION_TEMP: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Aggressive,
    #[serde(alias = "neutral")]
    Balanced,
    #[serde(alias = "cautious")]
    Conservative,
}

impl Default for StrategyKind {
    fn default() -> Self {
        StrategyKind::Balanced
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            StrategyKind::Aggressive => "aggressive",
            StrategyKind::Balanced => "balanced",
            StrategyKind::Conservative => "conservative",
        };
        write!(f, "{}", name)
    }
}

impl StrategyKind {
    /// policy returns the behaviour shared by all agents of this kind.
    pub fn policy(self) -> &'static dyn DrivingStrategy {
        match self {
            StrategyKind::Aggressive => &Aggressive,
            StrategyKind::Balanced => &Balanced,
            StrategyKind::Conservative => &Conservative,
        }
    }
}

/// * `pace` - Fraction of the maximum speed targeted on straights
/// * `cornering` - Exponent applied to the corner speed factor (< 1.0 carries more speed)
/// * `wear_factor` - Multiplier on tyre tread consumption
/// * `heat_factor` - Multiplier on the engine temperature rise with speed
/// * `battery_factor` - Multiplier on the battery drain
/// * `overtake_probability` - Chance per tick to attack when inside the overtake window
/// * `rain_caution` - Relative speed reduction in the rain
/// * `heat_caution` - Relative speed reduction while the engine runs hot
/// * `jitter_sd` - (m/s) Standard deviation of the driver's speed noise
/// * `pit_threshold` - Tread (%) below which the driver is willing to pit
/// * `lane` - Preferred lateral position as fraction of the half width (positive: left)
/// * `attack_lane` - Lateral position while attacking
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyProfile {
    pub pace: f64,
    pub cornering: f64,
    pub wear_factor: f64,
    pub heat_factor: f64,
    pub battery_factor: f64,
    pub overtake_probability: f64,
    pub rain_caution: f64,
    pub heat_caution: f64,
    pub jitter_sd: f64,
    pub pit_threshold: f64,
    pub lane: f64,
    pub attack_lane: f64,
}

static AGGRESSIVE_PROFILE: StrategyProfile = StrategyProfile {
    pace: 0.95,
    cornering: 0.8,
    wear_factor: 1.6,
    heat_factor: 1.15,
    battery_factor: 1.3,
    overtake_probability: 0.35,
    rain_caution: 0.12,
    heat_caution: 0.0,
    jitter_sd: 0.8,
    pit_threshold: 6.0,
    lane: 0.1,
    attack_lane: 0.6,
};

static BALANCED_PROFILE: StrategyProfile = StrategyProfile {
    pace: 0.85,
    cornering: 1.0,
    wear_factor: 1.0,
    heat_factor: 1.0,
    battery_factor: 1.0,
    overtake_probability: 0.15,
    rain_caution: 0.2,
    heat_caution: 0.05,
    jitter_sd: 0.5,
    pit_threshold: 10.0,
    lane: 0.0,
    attack_lane: 0.4,
};

static CONSERVATIVE_PROFILE: StrategyProfile = StrategyProfile {
    pace: 0.75,
    cornering: 1.2,
    wear_factor: 0.6,
    heat_factor: 0.85,
    battery_factor: 0.8,
    overtake_probability: 0.05,
    rain_caution: 0.3,
    heat_caution: 0.15,
    jitter_sd: 0.3,
    pit_threshold: 10.0,
    lane: -0.2,
    attack_lane: -0.2,
};

/// Everything a strategy may look at when deciding on its targets.
#[derive(Debug, Clone)]
pub struct StrategyInput {
    pub speed: f64,
    pub max_speed: f64,
    pub progress: f64,
    pub lap: u32,
    pub laps_remaining: u32,
    pub health: Health,
    pub raining: bool,
    /// (m) Distance to the next car ahead on track, if any
    pub gap_ahead: Option<f64>,
    pub attacking: bool,
}

pub trait DrivingStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn profile(&self) -> &StrategyProfile;

    /// target_speed returns the unclamped speed (m/s) the driver wants to reach.
    fn target_speed(&self, input: &StrategyInput, track: &Track) -> f64 {
        let p = self.profile();

        let kappa = track.curvature_at(input.progress);
        let corner = lin_interp(kappa, &CORNER_KAPPA, &CORNER_FACTOR).powf(p.cornering);

        let mut target = input.max_speed * p.pace * corner;

        if input.raining {
            target *= 1.0 - p.rain_caution;
        }
        if input.health.engine_temp > HEAT_CAUTION_TEMP {
            target *= 1.0 - p.heat_caution;
        }

        // worn tyres cost up to 15 % of pace
        target *= 0.85 + 0.15 * input.health.tire_wear / 100.0;

        if input.attacking {
            target *= 1.0 + SLIPSTREAM_BOOST;
        }

        target
    }

    /// lane_offset returns the desired lateral position as a fraction of the half width.
    fn lane_offset(&self, input: &StrategyInput) -> f64 {
        let p = self.profile();
        if input.attacking {
            p.attack_lane
        } else {
            p.lane
        }
    }

    /// wants_pit is only consulted once the tread is below the mandatory pit level.
    fn wants_pit(&self, health: &Health, _laps_remaining: u32) -> bool {
        health.tire_wear < self.profile().pit_threshold
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Aggressive;

#[derive(Debug, Clone, Copy)]
pub struct Balanced;

#[derive(Debug, Clone, Copy)]
pub struct Conservative;

impl DrivingStrategy for Aggressive {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Aggressive
    }

    fn profile(&self) -> &StrategyProfile {
        &AGGRESSIVE_PROFILE
    }

    /// Stays out on the last lap no matter the tyres.
    fn wants_pit(&self, health: &Health, laps_remaining: u32) -> bool {
        laps_remaining > 1 && health.tire_wear < self.profile().pit_threshold
    }
}

impl DrivingStrategy for Balanced {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Balanced
    }

    fn profile(&self) -> &StrategyProfile {
        &BALANCED_PROFILE
    }
}

impl DrivingStrategy for Conservative {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Conservative
    }

    fn profile(&self) -> &StrategyProfile {
        &CONSERVATIVE_PROFILE
    }

    /// Holds the inside line and tucks in further when closing on the car ahead.
    fn lane_offset(&self, input: &StrategyInput) -> f64 {
        match input.gap_ahead {
            Some(gap) if gap < 10.0 => self.profile().lane - 0.2,
            _ => self.profile().lane,
        }
    }
}
