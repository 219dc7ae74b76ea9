use crate::core::agent::{Agent, AgentStatus};
use crate::core::strategy::StrategyInput;
use crate::core::track::Track;
use crate::error::SimError;
use helpers::general::{shortest_turn, wrap_degrees};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// (%/s) Tread consumed at full speed by a balanced driver.
const BASE_WEAR_RATE: f64 = 0.3;
/// Extra tread consumption on a wet track.
const RAIN_WEAR_MULT: f64 = 1.1;
/// (°C) Engine temperature at standstill and the additional heat at full speed.
const ENGINE_TEMP_IDLE: f64 = 60.0;
const ENGINE_TEMP_SPAN: f64 = 25.0;
/// (°C) Cooling by rain.
const RAIN_COOLING: f64 = 5.0;
/// (s) Time constant of the engine temperature.
const ENGINE_TEMP_TAU: f64 = 20.0;
/// (%/s) Battery drain at full speed by a balanced driver.
const BASE_BATTERY_DRAIN: f64 = 0.05;
/// Share of the steering authority left to an impaired driver.
const IMPAIRED_STEERING: f64 = 0.5;
/// Lane noise of an impaired driver as a share of the half track width.
const IMPAIRED_LANE_NOISE: f64 = 0.5;

/// * `min_speed` - (m/s) Minimum speed, also the pit lane limit
/// * `max_speed` - (m/s) Maximum speed
/// * `max_accel` - (m/s²) Maximum acceleration
/// * `max_decel` - (m/s²) Maximum deceleration
/// * `max_turn_rate` - (deg/s) Maximum heading change rate
/// * `max_lateral_rate` - (m/s) Maximum lane change rate
/// * `overtake_window` - (m) Gap to the car ahead below which an attack may be launched
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PhysicsPars {
    pub min_speed: f64,
    pub max_speed: f64,
    pub max_accel: f64,
    pub max_decel: f64,
    pub max_turn_rate: f64,
    pub max_lateral_rate: f64,
    pub overtake_window: f64,
}

impl Default for PhysicsPars {
    fn default() -> Self {
        PhysicsPars {
            min_speed: 5.0,
            max_speed: 90.0,
            max_accel: 12.0,
            max_decel: 25.0,
            max_turn_rate: 120.0,
            max_lateral_rate: 2.0,
            overtake_window: 25.0,
        }
    }
}

impl PhysicsPars {
    pub fn validate(&self) -> Result<(), SimError> {
        let all_positive = [
            self.min_speed,
            self.max_speed,
            self.max_accel,
            self.max_decel,
            self.max_turn_rate,
            self.max_lateral_rate,
        ]
        .iter()
        .all(|v| v.is_finite() && *v > 0.0);

        if !all_positive {
            return Err(SimError::config(
                "Physics parameters must be finite and positive!",
            ));
        }
        if self.min_speed >= self.max_speed {
            return Err(SimError::config(format!(
                "Minimum speed {}m/s must be below the maximum speed {}m/s!",
                self.min_speed, self.max_speed
            )));
        }
        if !(self.overtake_window.is_finite() && self.overtake_window >= 0.0) {
            return Err(SimError::config("The overtake window must not be negative!"));
        }
        Ok(())
    }
}

/// Everything the stepper needs to know about the world during one tick.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub track: &'a Track,
    pub physics: &'a PhysicsPars,
    pub tick_duration: f64,
    pub raining: bool,
    pub total_laps: u32,
}

/// Lap fractions before and after a step, handed to the race director.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub prev_progress: f64,
    pub new_progress: f64,
}

/// step_agent advances a single agent by one tick. Random draws happen in a fixed order (attack
/// draw, driver jitter, then lane noise while the controls are impaired) so a seeded generator
/// reproduces the run exactly.
///
/// The agent is left partially updated on error; callers work on a copy.
pub fn step_agent<R: Rng + ?Sized>(
    agent: &mut Agent,
    ctx: &StepContext,
    gap_ahead: Option<f64>,
    rng: &mut R,
) -> Result<MotionSample, SimError> {
    let track = ctx.track;
    let physics = ctx.physics;
    let dt = ctx.tick_duration;
    let policy = agent.strategy.policy();
    let profile = policy.profile();
    let in_pit = agent.status == AgentStatus::Pit;

    // SPEED ---------------------------------------------------------------------------------------
    let attacking = !in_pit
        && matches!(gap_ahead, Some(gap) if gap <= physics.overtake_window)
        && rng.gen::<f64>() < profile.overtake_probability;

    let input = StrategyInput {
        speed: agent.speed,
        max_speed: physics.max_speed,
        progress: agent.progress,
        lap: agent.lap,
        laps_remaining: ctx.total_laps.saturating_sub(agent.lap),
        health: agent.health,
        raining: ctx.raining,
        gap_ahead,
        attacking,
    };

    let mut desired = if in_pit || agent.engine_failed() {
        physics.min_speed
    } else {
        policy.target_speed(&input, track)
    };

    if !in_pit && !agent.engine_failed() && profile.jitter_sd > 0.0 {
        let jitter = Normal::new(0.0, profile.jitter_sd)
            .map_err(|e| SimError::invalid_state(format!("Invalid driver jitter: {}", e)))?;
        desired += jitter.sample(rng);
    }
    let desired = desired.clamp(physics.min_speed, physics.max_speed);

    let dv = (desired - agent.speed).clamp(-physics.max_decel * dt, physics.max_accel * dt);
    agent.speed = (agent.speed + dv).clamp(physics.min_speed, physics.max_speed);

    if !agent.speed.is_finite() {
        return Err(violation(agent, format!("non-finite speed {}", agent.speed)));
    }

    // LANE ----------------------------------------------------------------------------------------
    let impaired = agent.control_impaired();
    let steering = if impaired { IMPAIRED_STEERING } else { 1.0 };

    let half_width = track.width / 2.0;
    let mut target_lane = if in_pit {
        -half_width
    } else {
        policy.lane_offset(&input) * half_width
    };
    if impaired {
        target_lane += rng.gen_range(-1.0_f64..=1.0) * IMPAIRED_LANE_NOISE * half_width;
    }
    let target_lane = target_lane.clamp(-half_width, half_width);
    let max_shift = physics.max_lateral_rate * steering * dt;
    let shift = (target_lane - agent.lane_offset).clamp(-max_shift, max_shift);
    agent.lane_offset = (agent.lane_offset + shift).clamp(-half_width, half_width);

    // POSITION AND HEADING ------------------------------------------------------------------------
    let prev_progress = agent.progress;
    let line_fraction = agent.line_fraction + agent.speed * dt / track.length;
    if !line_fraction.is_finite() {
        return Err(violation(agent, "non-finite line position".to_owned()));
    }
    agent.line_fraction = line_fraction.rem_euclid(1.0);

    let (position, tangent) = track.offset_point(agent.line_fraction, agent.lane_offset);
    agent.position = position;
    agent.progress = track.progress_at(&position);

    let max_turn = physics.max_turn_rate * steering * dt;
    let turn = shortest_turn(agent.heading, tangent).clamp(-max_turn, max_turn);
    agent.heading = wrap_degrees(agent.heading + turn);

    // HEALTH --------------------------------------------------------------------------------------
    let speed_ratio = agent.speed / physics.max_speed;

    let rain_mult = if ctx.raining { RAIN_WEAR_MULT } else { 1.0 };
    let wear = (BASE_WEAR_RATE * profile.wear_factor * (0.4 + 0.6 * speed_ratio) * rain_mult * dt)
        .min(agent.health.tire_wear.max(0.0));
    agent.health.tire_wear -= wear;
    agent.cumulative_tire_wear += wear;

    let rain_cooling = if ctx.raining { RAIN_COOLING } else { 0.0 };
    let temp_target =
        ENGINE_TEMP_IDLE + ENGINE_TEMP_SPAN * speed_ratio * profile.heat_factor - rain_cooling;
    agent.health.engine_temp += (temp_target - agent.health.engine_temp) * dt / ENGINE_TEMP_TAU;

    agent.health.battery -= BASE_BATTERY_DRAIN * profile.battery_factor * speed_ratio * dt;
    agent.health.clamp();

    agent.cumulative_time += dt;

    check_invariants(agent, physics)?;

    Ok(MotionSample {
        prev_progress,
        new_progress: agent.progress,
    })
}

fn violation(agent: &Agent, detail: String) -> SimError {
    SimError::InvariantViolation {
        agent: agent.id,
        detail,
    }
}

/// check_invariants verifies the state every agent must be in after a step.
pub fn check_invariants(agent: &Agent, physics: &PhysicsPars) -> Result<(), SimError> {
    if !(agent.speed.is_finite()
        && agent.speed >= physics.min_speed
        && agent.speed <= physics.max_speed)
    {
        return Err(violation(
            agent,
            format!(
                "speed {} outside [{}, {}]",
                agent.speed, physics.min_speed, physics.max_speed
            ),
        ));
    }
    if !agent.position.is_finite() {
        return Err(violation(
            agent,
            format!(
                "non-finite position ({}, {})",
                agent.position.x, agent.position.y
            ),
        ));
    }
    if !(agent.progress.is_finite() && (0.0..1.0).contains(&agent.progress)) {
        return Err(violation(
            agent,
            format!("progress {} outside [0, 1)", agent.progress),
        ));
    }
    if !(agent.heading.is_finite() && (0.0..360.0).contains(&agent.heading)) {
        return Err(violation(agent, format!("heading {}", agent.heading)));
    }
    if !agent.health.is_finite() {
        return Err(violation(agent, "non-finite health".to_owned()));
    }
    Ok(())
}
