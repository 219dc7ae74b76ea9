use crate::core::agent::{Agent, AgentStatus, Health};
use crate::core::agent_store::AgentStore;
use crate::core::engine::RacePars;
use crate::core::event_log::{Event, EventLog, Severity};
use crate::core::stepper::MotionSample;
use crate::core::track::Track;
use crate::error::SimError;
use helpers::general::cmp_desc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Health thresholds of the agent state machine.
const WARN_ENGINE_TEMP: f64 = 90.0;
const WARN_BATTERY: f64 = 15.0;
const WARN_TIRE_WEAR: f64 = 20.0;
const PIT_TIRE_WEAR: f64 = 10.0;
const RECOVER_ENGINE_TEMP: f64 = 85.0;
const RECOVER_BATTERY: f64 = 20.0;
const RECOVER_TIRE_WEAR: f64 = 20.0;
/// (°C) Engine temperature after a pit stop.
const PIT_ENGINE_TEMP: f64 = 60.0;

/// (s) Duration of scheduled failures that do not name one.
const DEFAULT_ENGINE_FAILURE_DURATION: f64 = 5.0;
const DEFAULT_CONTROL_IMPAIRMENT_DURATION: f64 = 3.0;

/// Kinds of hazards that can be scheduled at a fixed race time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    #[serde(alias = "RAIN_ON")]
    RainOn,
    #[serde(alias = "RAIN_OFF")]
    RainOff,
    #[serde(alias = "ENGINE_FAILURE")]
    EngineFailure,
    #[serde(alias = "CONTROL_IMPAIRMENT")]
    ControlImpairment,
}

impl HazardKind {
    fn targets_agent(&self) -> bool {
        matches!(self, HazardKind::EngineFailure | HazardKind::ControlImpairment)
    }
}

/// A hazard that fires in the first tick ending at or after `time`.
/// * `time` - (s) Race time
/// * `agent` - Affected agent, required for failures
/// * `duration` - (s) Duration of a failure
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScheduledEvent {
    #[serde(rename = "type", alias = "kind")]
    pub kind: HazardKind,
    pub time: f64,
    #[serde(default, alias = "vehicle_id")]
    pub agent: Option<u32>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Per-tick hazard probabilities and scheduled hazards.
/// * `rain_start_probability` - Chance per tick that it starts raining on a dry track
/// * `rain_stop_probability` - Chance per tick that the rain stops
/// * `overheat_probability` - Chance per tick that a random running agent overheats
/// * `overheat_delta` - (°C) Engine temperature increase of an overheating agent
/// * `engine_failure_probability` - Chance per tick and running agent of an engine failure
/// * `engine_failure_duration` - (s) Range the failure duration is drawn from
/// * `control_impairment_probability` - Chance per tick and running agent of impaired controls
/// * `control_impairment_duration` - (s) Range the impairment duration is drawn from
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct HazardPars {
    pub rain_start_probability: f64,
    pub rain_stop_probability: f64,
    pub overheat_probability: f64,
    pub overheat_delta: f64,
    pub engine_failure_probability: f64,
    pub engine_failure_duration: [f64; 2],
    pub control_impairment_probability: f64,
    pub control_impairment_duration: [f64; 2],
    pub scheduled_events: Vec<ScheduledEvent>,
}

impl Default for HazardPars {
    fn default() -> Self {
        HazardPars {
            rain_start_probability: 0.001,
            rain_stop_probability: 0.004,
            overheat_probability: 0.002,
            overheat_delta: 15.0,
            engine_failure_probability: 0.0002,
            engine_failure_duration: [2.0, 5.0],
            control_impairment_probability: 0.0005,
            control_impairment_duration: [1.0, 3.0],
            scheduled_events: vec![],
        }
    }
}

impl HazardPars {
    /// No hazards at all, used for scripted scenarios.
    pub fn none() -> HazardPars {
        HazardPars {
            rain_start_probability: 0.0,
            rain_stop_probability: 0.0,
            overheat_probability: 0.0,
            overheat_delta: 0.0,
            engine_failure_probability: 0.0,
            control_impairment_probability: 0.0,
            ..HazardPars::default()
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        for p in [
            self.rain_start_probability,
            self.rain_stop_probability,
            self.overheat_probability,
            self.engine_failure_probability,
            self.control_impairment_probability,
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SimError::config(format!(
                    "Hazard probability {} is outside [0, 1]!",
                    p
                )));
            }
        }
        if !(self.overheat_delta.is_finite() && self.overheat_delta >= 0.0) {
            return Err(SimError::config("The overheat delta must not be negative!"));
        }
        for [lo, hi] in [self.engine_failure_duration, self.control_impairment_duration] {
            if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
                return Err(SimError::config(format!(
                    "Invalid failure duration range [{}, {}]!",
                    lo, hi
                )));
            }
        }
        for event in self.scheduled_events.iter() {
            if !(event.time.is_finite() && event.time >= 0.0) {
                return Err(SimError::config(format!(
                    "Scheduled {:?} at invalid time {}!",
                    event.kind, event.time
                )));
            }
            if event.kind.targets_agent() && event.agent.is_none() {
                return Err(SimError::config(format!(
                    "Scheduled {:?} at {}s needs an agent!",
                    event.kind, event.time
                )));
            }
            if let Some(duration) = event.duration {
                if !(duration.is_finite() && duration > 0.0) {
                    return Err(SimError::config(format!(
                        "Scheduled {:?} has invalid duration {}!",
                        event.kind, duration
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    Dry,
    Rain,
}

impl Default for Weather {
    fn default() -> Self {
        Weather::Dry
    }
}

/// Discrete race clock, race time is derived from the tick count to avoid drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickClock {
    pub tick: u64,
    pub dt: f64,
}

impl TickClock {
    pub fn new(dt: f64) -> TickClock {
        TickClock { tick: 0, dt }
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }

    /// (s) Race time at the end of the current tick.
    pub fn time(&self) -> f64 {
        self.tick as f64 * self.dt
    }
}

/// Result of a lap crossing during one tick.
#[derive(Debug, Clone, Copy)]
struct LapCrossing {
    lap: u32,
    lap_time: f64,
    crossing_time: f64,
    finished: bool,
}

/// standings_cmp orders finished agents by finishing position, ahead of all unfinished agents,
/// which are ordered by lap and lap fraction. The id breaks remaining ties.
pub fn standings_cmp(a: &Agent, b: &Agent) -> Ordering {
    match (a.finish_position, b.finish_position) {
        (Some(pos_a), Some(pos_b)) => pos_a.cmp(&pos_b).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b
            .lap
            .cmp(&a.lap)
            .then_with(|| cmp_desc(a.progress, b.progress))
            .then_with(|| a.id.cmp(&b.id)),
    }
}

/// standings returns the agents in race order.
pub fn standings(store: &AgentStore) -> Vec<&Agent> {
    let mut ranked: Vec<&Agent> = store.all().collect();
    ranked.sort_by(|a, b| standings_cmp(a, b));
    ranked
}

/// run_down shortens a failure timer by one tick, returns true when the failure just ended.
fn run_down(timer: &mut f64, dt: f64) -> bool {
    if *timer <= 0.0 {
        return false;
    }
    *timer -= dt;
    if *timer > 1e-9 {
        return false;
    }
    *timer = 0.0;
    true
}

/// health_warning names the first metric outside its safe band, if any.
fn health_warning(health: &Health) -> Option<String> {
    if health.engine_temp > WARN_ENGINE_TEMP {
        Some(format!(
            "engine temperature high ({:.1}°C)",
            health.engine_temp
        ))
    } else if health.battery < WARN_BATTERY {
        Some(format!("battery low ({:.1}%)", health.battery))
    } else if health.tire_wear < WARN_TIRE_WEAR {
        Some(format!("tyres worn ({:.1}% tread left)", health.tire_wear))
    } else {
        None
    }
}

fn health_recovered(health: &Health) -> bool {
    health.engine_temp <= RECOVER_ENGINE_TEMP
        && health.battery >= RECOVER_BATTERY
        && health.tire_wear >= RECOVER_TIRE_WEAR
}

/// RaceDirector applies the race rules on top of the agent motion: weather and hazards, lap
/// counting, the health state machine with pit stops, finishing and the standings. Everything
/// worth telling ends up in its event log.
#[derive(Debug, Clone)]
pub struct RaceDirector {
    tot_no_laps: u32,
    pit_duration: f64,
    hazard_pars: HazardPars,
    pub weather: Weather,
    pub events: EventLog,
    no_finished: u32,
    fastest_lap: Option<f64>,
    prev_ranks: HashMap<u32, usize>,
    /// Scheduled events that already fired, by index.
    fired: Vec<bool>,
}

impl RaceDirector {
    pub fn new(race_pars: &RacePars, hazard_pars: &HazardPars) -> RaceDirector {
        RaceDirector {
            tot_no_laps: race_pars.tot_no_laps,
            pit_duration: race_pars.pit_duration,
            hazard_pars: hazard_pars.to_owned(),
            weather: Weather::Dry,
            events: EventLog::new(race_pars.event_retention),
            no_finished: 0,
            fastest_lap: None,
            prev_ranks: HashMap::new(),
            fired: vec![false; hazard_pars.scheduled_events.len()],
        }
    }

    pub fn raining(&self) -> bool {
        self.weather == Weather::Rain
    }

    pub fn no_finished(&self) -> u32 {
        self.no_finished
    }

    pub fn emit(
        &mut self,
        clock: &TickClock,
        lap: u32,
        severity: Severity,
        agent: Option<u32>,
        message: String,
    ) {
        self.events.push(Event {
            timestamp: clock.time(),
            tick: clock.tick,
            lap,
            severity,
            agent,
            message,
        });
    }

    fn leader_lap(store: &AgentStore) -> u32 {
        store.all().map(|agent| agent.lap).max().unwrap_or(0)
    }

    // ---------------------------------------------------------------------------------------------
    // HAZARDS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// roll_hazards runs the hazard process of one tick. Failure timers run down and scheduled
    /// events due by the end of the tick fire first, neither draws from the generator. Then the
    /// weather toggle and the overheat roll are drawn, picking the overheating agent takes one
    /// further draw. Last, every running agent in id order rolls for an engine failure and for
    /// impaired controls, each roll followed by a duration draw if it hits. Rolls with zero
    /// probability are skipped.
    pub fn roll_hazards<R: Rng + ?Sized>(
        &mut self,
        store: &mut AgentStore,
        clock: &TickClock,
        rng: &mut R,
    ) -> Result<(), SimError> {
        self.run_down_failures(store, clock)?;
        self.fire_scheduled(store, clock)?;

        let lap = RaceDirector::leader_lap(store);

        let weather_draw = rng.gen::<f64>();
        match self.weather {
            Weather::Dry if weather_draw < self.hazard_pars.rain_start_probability => {
                self.set_weather(Weather::Rain, clock, lap);
            }
            Weather::Rain if weather_draw < self.hazard_pars.rain_stop_probability => {
                self.set_weather(Weather::Dry, clock, lap);
            }
            _ => {}
        }

        let overheat_draw = rng.gen::<f64>();
        if overheat_draw < self.hazard_pars.overheat_probability {
            let candidates = RaceDirector::on_track(store);

            if !candidates.is_empty() {
                let id = candidates[rng.gen_range(0..candidates.len())];
                let delta = self.hazard_pars.overheat_delta;
                let (name, lap, temp) = store.update(id, |agent| {
                    agent.health.engine_temp += delta;
                    agent.health.clamp();
                    Ok((agent.name.to_owned(), agent.lap, agent.health.engine_temp))
                })?;
                self.emit(
                    clock,
                    lap,
                    Severity::Warning,
                    Some(id),
                    format!("{} engine overheating ({:.1}°C)", name, temp),
                );
            }
        }

        let p_failure = self.hazard_pars.engine_failure_probability;
        let p_impairment = self.hazard_pars.control_impairment_probability;
        let [failure_lo, failure_hi] = self.hazard_pars.engine_failure_duration;
        let [impairment_lo, impairment_hi] = self.hazard_pars.control_impairment_duration;

        for id in RaceDirector::on_track(store) {
            if p_failure > 0.0 && rng.gen::<f64>() < p_failure {
                let duration = rng.gen_range(failure_lo..=failure_hi);
                self.apply_failure(store, clock, id, HazardKind::EngineFailure, duration)?;
            }
            if p_impairment > 0.0 && rng.gen::<f64>() < p_impairment {
                let duration = rng.gen_range(impairment_lo..=impairment_hi);
                self.apply_failure(store, clock, id, HazardKind::ControlImpairment, duration)?;
            }
        }

        Ok(())
    }

    /// Ids of the agents that are racing on track, i.e. neither finished, frozen nor pitting.
    fn on_track(store: &AgentStore) -> Vec<u32> {
        store
            .all()
            .filter(|agent| agent.is_moving() && agent.status != AgentStatus::Pit)
            .map(|agent| agent.id)
            .collect()
    }

    fn set_weather(&mut self, weather: Weather, clock: &TickClock, lap: u32) {
        if self.weather == weather {
            return;
        }
        self.weather = weather;
        match weather {
            Weather::Rain => {
                self.emit(clock, lap, Severity::Warning, None, "Rain started".to_owned())
            }
            Weather::Dry => self.emit(
                clock,
                lap,
                Severity::Info,
                None,
                "Track is drying up".to_owned(),
            ),
        }
    }

    /// apply_failure starts an engine failure or a control impairment. An agent already
    /// suffering from the same failure keeps its running timer.
    fn apply_failure(
        &mut self,
        store: &mut AgentStore,
        clock: &TickClock,
        id: u32,
        kind: HazardKind,
        duration: f64,
    ) -> Result<(), SimError> {
        let started = store.update(id, |agent| {
            if !agent.is_moving() {
                return Ok(None);
            }
            let timer = match kind {
                HazardKind::EngineFailure => &mut agent.engine_failure_left,
                HazardKind::ControlImpairment => &mut agent.control_impairment_left,
                HazardKind::RainOn | HazardKind::RainOff => return Ok(None),
            };
            if *timer > 0.0 {
                return Ok(None);
            }
            *timer = duration;
            Ok(Some((agent.name.to_owned(), agent.lap)))
        })?;

        if let Some((name, lap)) = started {
            let what = match kind {
                HazardKind::EngineFailure => "suffers an engine failure",
                _ => "struggles with impaired controls",
            };
            self.emit(
                clock,
                lap,
                Severity::Warning,
                Some(id),
                format!("{} {} ({:.1}s)", name, what, duration),
            );
        }
        Ok(())
    }

    /// run_down_failures advances the failure timers of all agents by one tick.
    fn run_down_failures(
        &mut self,
        store: &mut AgentStore,
        clock: &TickClock,
    ) -> Result<(), SimError> {
        let dt = clock.dt;
        for id in store.ids() {
            let (engine, controls, name, lap) = store.update(id, |agent| {
                let engine = run_down(&mut agent.engine_failure_left, dt);
                let controls = run_down(&mut agent.control_impairment_left, dt);
                Ok((engine, controls, agent.name.to_owned(), agent.lap))
            })?;

            if engine {
                let message = format!("{} engine recovered", name);
                self.emit(clock, lap, Severity::Info, Some(id), message);
            }
            if controls {
                let message = format!("{} regains control", name);
                self.emit(clock, lap, Severity::Info, Some(id), message);
            }
        }
        Ok(())
    }

    /// fire_scheduled applies every scheduled event due by the end of the current tick.
    fn fire_scheduled(
        &mut self,
        store: &mut AgentStore,
        clock: &TickClock,
    ) -> Result<(), SimError> {
        let now = clock.time() + 1e-9;
        let lap = RaceDirector::leader_lap(store);

        for idx in 0..self.hazard_pars.scheduled_events.len() {
            let event = self.hazard_pars.scheduled_events[idx].to_owned();
            if self.fired[idx] || event.time > now {
                continue;
            }
            self.fired[idx] = true;
            log::debug!("Scheduled {:?} fires at tick {}", event.kind, clock.tick);

            match (event.kind, event.agent) {
                (HazardKind::RainOn, _) => self.set_weather(Weather::Rain, clock, lap),
                (HazardKind::RainOff, _) => self.set_weather(Weather::Dry, clock, lap),
                (HazardKind::EngineFailure, Some(id)) => {
                    let duration = event.duration.unwrap_or(DEFAULT_ENGINE_FAILURE_DURATION);
                    self.apply_failure(store, clock, id, event.kind, duration)?;
                }
                (HazardKind::ControlImpairment, Some(id)) => {
                    let duration = event.duration.unwrap_or(DEFAULT_CONTROL_IMPAIRMENT_DURATION);
                    self.apply_failure(store, clock, id, event.kind, duration)?;
                }
                (kind, None) => log::warn!("Scheduled {:?} without an agent is ignored", kind),
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // LAPS AND FINISH -----------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// process_motion handles lap crossings and finishing for all agents that moved this tick.
    /// A lap only counts once the agent passed the half-lap checkpoint since the last crossing.
    pub fn process_motion(
        &mut self,
        store: &mut AgentStore,
        track: &Track,
        samples: &[(u32, MotionSample)],
        clock: &TickClock,
    ) -> Result<(), SimError> {
        for (id, sample) in samples.iter() {
            let prev = sample.prev_progress;
            let new = sample.new_progress;
            let tot_no_laps = self.tot_no_laps;
            let finish_position = self.no_finished + 1;
            let tick_start = clock.time() - clock.dt;
            let dt = clock.dt;

            let crossing = store.update(*id, |agent| {
                if !agent.lap_armed && prev < 0.5 && new >= 0.5 && new - prev < 0.5 {
                    agent.lap_armed = true;
                }
                if !(agent.lap_armed && track.lap_completed(prev, new)) {
                    return Ok(None);
                }

                // interpolate the moment the line was crossed within this tick
                let frac = (1.0 - prev) / ((1.0 - prev) + new);
                let crossing_time = tick_start + frac * dt;
                let lap_time = crossing_time - agent.lap_start_time;

                agent.lap += 1;
                agent.lap_armed = false;
                agent.lap_start_time = crossing_time;
                agent.last_lap_time = Some(lap_time);
                agent.lap_times.push(lap_time);
                if agent.best_lap_time.map_or(true, |best| lap_time < best) {
                    agent.best_lap_time = Some(lap_time);
                }

                let finished = agent.lap >= tot_no_laps;
                if finished {
                    agent.status = AgentStatus::Finished;
                    agent.finish_time = Some(crossing_time);
                    agent.finish_position = Some(finish_position);
                }

                Ok(Some(LapCrossing {
                    lap: agent.lap,
                    lap_time,
                    crossing_time,
                    finished,
                }))
            })?;

            if let Some(crossing) = crossing {
                let name = store.get(*id)?.name.to_owned();

                self.emit(
                    clock,
                    crossing.lap,
                    Severity::Info,
                    Some(*id),
                    format!(
                        "{} completed lap {} in {:.3}s",
                        name, crossing.lap, crossing.lap_time
                    ),
                );

                if self
                    .fastest_lap
                    .map_or(true, |fastest| crossing.lap_time < fastest)
                {
                    self.fastest_lap = Some(crossing.lap_time);
                    self.emit(
                        clock,
                        crossing.lap,
                        Severity::Info,
                        Some(*id),
                        format!("Fastest lap: {} with {:.3}s", name, crossing.lap_time),
                    );
                }

                if crossing.finished {
                    self.no_finished += 1;
                    self.emit(
                        clock,
                        crossing.lap,
                        Severity::Info,
                        Some(*id),
                        format!(
                            "{} finished P{} after {:.3}s",
                            name, self.no_finished, crossing.crossing_time
                        ),
                    );
                }
            }
        }

        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // HEALTH STATE MACHINE ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// evaluate_health performs at most one status transition per agent and tick.
    pub fn evaluate_health(
        &mut self,
        store: &mut AgentStore,
        clock: &TickClock,
    ) -> Result<(), SimError> {
        for id in store.ids() {
            let agent = store.get(id)?;
            let name = agent.name.to_owned();
            let lap = agent.lap;
            let health = agent.health;
            let laps_remaining = self.tot_no_laps.saturating_sub(lap);

            match agent.status {
                AgentStatus::Active => {
                    if let Some(metric) = health_warning(&health) {
                        store.update(id, |agent| {
                            agent.status = AgentStatus::Warning;
                            Ok(())
                        })?;
                        self.emit(
                            clock,
                            lap,
                            Severity::Warning,
                            Some(id),
                            format!("{} {}", name, metric),
                        );
                    }
                }
                AgentStatus::Warning => {
                    if agent.frozen {
                        continue;
                    }

                    if health.tire_wear < PIT_TIRE_WEAR
                        && agent.strategy.policy().wants_pit(&health, laps_remaining)
                    {
                        let pit_duration = self.pit_duration;
                        store.update(id, |agent| {
                            agent.status = AgentStatus::Pit;
                            agent.pit_time_left = pit_duration;
                            agent.pit_stops += 1;
                            Ok(())
                        })?;
                        self.emit(
                            clock,
                            lap,
                            Severity::Info,
                            Some(id),
                            format!(
                                "{} pits with {:.1}% tread left",
                                name, health.tire_wear
                            ),
                        );
                    } else if health_recovered(&health) {
                        store.update(id, |agent| {
                            agent.status = AgentStatus::Active;
                            Ok(())
                        })?;
                        self.emit(
                            clock,
                            lap,
                            Severity::Info,
                            Some(id),
                            format!("{} back to normal", name),
                        );
                    }
                }
                AgentStatus::Pit => {
                    let dt = clock.dt;
                    let released = store.update(id, |agent| {
                        agent.pit_time_left -= dt;
                        if agent.pit_time_left > 1e-9 {
                            return Ok(false);
                        }
                        agent.pit_time_left = 0.0;
                        agent.status = AgentStatus::Active;
                        agent.health.tire_wear = 100.0;
                        agent.health.battery = 100.0;
                        agent.health.engine_temp = agent.health.engine_temp.min(PIT_ENGINE_TEMP);
                        Ok(true)
                    })?;
                    if released {
                        self.emit(
                            clock,
                            lap,
                            Severity::Info,
                            Some(id),
                            format!("{} rejoins on fresh tyres", name),
                        );
                    }
                }
                AgentStatus::Finished => {}
            }
        }

        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // STANDINGS -----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// update_standings ranks the field and reports every pair of agents that swapped places
    /// since the last tick.
    pub fn update_standings(&mut self, store: &AgentStore, clock: &TickClock) -> Vec<u32> {
        let order: Vec<u32> = standings(store).iter().map(|agent| agent.id).collect();

        if !self.prev_ranks.is_empty() {
            let mut overtakes = vec![];
            for (rank, id) in order.iter().enumerate() {
                for behind in order[rank + 1..].iter() {
                    if let (Some(prev_a), Some(prev_b)) =
                        (self.prev_ranks.get(id), self.prev_ranks.get(behind))
                    {
                        if prev_a > prev_b {
                            overtakes.push((*id, *behind, rank + 1));
                        }
                    }
                }
            }

            for (id, behind, position) in overtakes {
                if let (Ok(a), Ok(b)) = (store.get(id), store.get(behind)) {
                    let message = format!("{} overtakes {} for P{}", a.name, b.name, position);
                    let lap = a.lap;
                    self.emit(clock, lap, Severity::Info, Some(id), message);
                }
            }
        }

        self.prev_ranks = order
            .iter()
            .enumerate()
            .map(|(rank, id)| (*id, rank))
            .collect();

        order
    }
}
