use crate::core::agent::{Agent, AgentStatus, Health};
use crate::core::agent_store::AgentStore;
use crate::core::director::{standings, RaceDirector, TickClock};
use crate::core::event_log::{Severity, DEFAULT_EVENT_RETENTION};
use crate::core::stepper::{step_agent, MotionSample, StepContext};
use crate::core::track::{Track, TrackCatalog};
use crate::error::SimError;
use crate::interfaces::snapshot::{RankedAgent, SimulationSnapshot};
use crate::pre::read_sim_pars::SimPars;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// * `track` - Track id, resolved through the track catalog
/// * `tot_no_laps` - Number of laps to complete
/// * `tick_duration` - (s) Simulated time per tick, in (0, 1]
/// * `pit_duration` - (s) Time spent in the pit lane per stop
/// * `event_retention` - Number of events kept in the event log
/// * `max_race_time` - (s) Headless runs are cut off after this race time
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RacePars {
    pub track: String,
    #[serde(alias = "total_laps", alias = "max_laps")]
    pub tot_no_laps: u32,
    pub tick_duration: f64,
    pub pit_duration: f64,
    pub event_retention: usize,
    pub max_race_time: f64,
}

impl Default for RacePars {
    fn default() -> Self {
        RacePars {
            track: "monaco".to_owned(),
            tot_no_laps: 5,
            tick_duration: 0.2,
            pit_duration: 6.0,
            event_retention: DEFAULT_EVENT_RETENTION,
            max_race_time: 3600.0,
        }
    }
}

impl RacePars {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.track.trim().is_empty() {
            return Err(SimError::config("No track given!"));
        }
        if self.tot_no_laps == 0 {
            return Err(SimError::config("The race must have at least one lap!"));
        }
        if !(self.tick_duration.is_finite() && self.tick_duration > 0.0 && self.tick_duration <= 1.0)
        {
            return Err(SimError::config(format!(
                "Tick duration {}s is outside (0, 1]!",
                self.tick_duration
            )));
        }
        if !(self.pit_duration.is_finite() && self.pit_duration >= 0.0) {
            return Err(SimError::config("The pit duration must not be negative!"));
        }
        if self.event_retention == 0 {
            return Err(SimError::config("The event retention must be positive!"));
        }
        if !(self.max_race_time.is_finite() && self.max_race_time > 0.0) {
            return Err(SimError::config("The maximum race time must be positive!"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimStatus {
    Idle,
    Running,
    Stopped,
    Error,
}

impl fmt::Display for SimStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SimStatus::Idle => "idle",
            SimStatus::Running => "running",
            SimStatus::Stopped => "stopped",
            SimStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Everything that belongs to one configured race.
#[derive(Debug, Clone)]
struct RaceSession {
    track: Track,
    store: AgentStore,
    director: RaceDirector,
    clock: TickClock,
    rng: ChaCha8Rng,
}

/// SimulationEngine owns one race at a time and advances it tick by tick. All randomness comes
/// from a generator seeded with the engine seed at `start()` and `reset()`, so identical
/// configurations produce identical runs.
#[derive(Debug)]
pub struct SimulationEngine {
    seed: u64,
    catalog: TrackCatalog,
    status: SimStatus,
    sim_pars: Option<SimPars>,
    session: Option<RaceSession>,
    snapshot: Arc<SimulationSnapshot>,
    violations: Vec<SimError>,
}

impl SimulationEngine {
    pub fn new(seed: u64) -> SimulationEngine {
        SimulationEngine::with_catalog(seed, TrackCatalog::new())
    }

    pub fn with_catalog(seed: u64, catalog: TrackCatalog) -> SimulationEngine {
        SimulationEngine {
            seed,
            catalog,
            status: SimStatus::Idle,
            sim_pars: None,
            session: None,
            snapshot: Arc::new(SimulationSnapshot::empty(SimStatus::Idle)),
            violations: vec![],
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn status(&self) -> SimStatus {
        self.status
    }

    pub fn sim_pars(&self) -> Option<&SimPars> {
        self.sim_pars.as_ref()
    }

    pub fn track(&self) -> Option<&Track> {
        self.session.as_ref().map(|session| &session.track)
    }

    /// (s) Tick duration of the configured race, or the default one.
    pub fn tick_duration(&self) -> f64 {
        self.sim_pars
            .as_ref()
            .map_or(RacePars::default().tick_duration, |pars| {
                pars.race_pars.tick_duration
            })
    }

    // ---------------------------------------------------------------------------------------------
    // CONTROL -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// start validates the configuration, builds a fresh race from it and sets the engine
    /// running. A rejected configuration leaves the engine untouched.
    pub fn start(&mut self, sim_pars: SimPars) -> Result<Arc<SimulationSnapshot>, SimError> {
        if self.status == SimStatus::Running {
            return Err(SimError::AlreadyRunning);
        }

        let mut session = self.build_session(&sim_pars)?;
        let message = format!(
            "Race started on {} over {} laps with {} agents",
            session.track.id,
            sim_pars.race_pars.tot_no_laps,
            session.store.len()
        );
        session
            .director
            .emit(&session.clock, 0, Severity::Info, None, message);

        self.sim_pars = Some(sim_pars);
        self.session = Some(session);
        self.status = SimStatus::Running;
        self.violations.clear();

        Ok(self.publish())
    }

    /// stop halts a running race; calling it on a race that is not running changes nothing.
    pub fn stop(&mut self) -> Arc<SimulationSnapshot> {
        if self.status == SimStatus::Running {
            self.status = SimStatus::Stopped;
            if let Some(session) = self.session.as_mut() {
                let lap = standings(&session.store).first().map_or(0, |a| a.lap);
                session.director.emit(
                    &session.clock,
                    lap,
                    Severity::Info,
                    None,
                    "Simulation stopped".to_owned(),
                );
            }
            return self.publish();
        }
        log::debug!("Stop requested while {}, nothing to do", self.status);
        Arc::clone(&self.snapshot)
    }

    /// reset rebuilds the last configured race in its initial state with the generator reseeded.
    /// It is refused while the race is running.
    pub fn reset(&mut self) -> Result<Arc<SimulationSnapshot>, SimError> {
        if self.status == SimStatus::Running {
            return Err(SimError::invalid_state(
                "Cannot reset a running simulation, stop it first",
            ));
        }

        self.session = match &self.sim_pars {
            Some(sim_pars) => Some(self.build_session(sim_pars)?),
            None => None,
        };
        self.status = SimStatus::Idle;
        self.violations.clear();
        log::info!("Simulation reset");

        Ok(self.publish())
    }

    fn build_session(&self, sim_pars: &SimPars) -> Result<RaceSession, SimError> {
        sim_pars.validate()?;

        let track = self.catalog.load(&sim_pars.race_pars.track)?;
        let store =
            AgentStore::from_pars(&sim_pars.agents, &track, sim_pars.physics_pars.min_speed)?;
        let mut director = RaceDirector::new(&sim_pars.race_pars, &sim_pars.hazard_pars);
        let clock = TickClock::new(sim_pars.race_pars.tick_duration);
        director.update_standings(&store, &clock);

        Ok(RaceSession {
            track,
            store,
            director,
            clock,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
        })
    }

    // ---------------------------------------------------------------------------------------------
    // TICK ----------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// tick advances the running race by one tick and returns the new snapshot. Agents that hit
    /// an invariant violation are frozen, the violations are available through
    /// `last_tick_violations()`.
    pub fn tick(&mut self) -> Result<Arc<SimulationSnapshot>, SimError> {
        if self.status != SimStatus::Running {
            return Err(SimError::NotRunning);
        }
        let sim_pars = self.sim_pars.as_ref().ok_or(SimError::NotRunning)?;
        let session = self.session.as_mut().ok_or(SimError::NotRunning)?;
        let RaceSession {
            track,
            store,
            director,
            clock,
            rng,
        } = session;

        clock.advance();
        director.roll_hazards(store, clock, rng)?;

        let ctx = StepContext {
            track,
            physics: &sim_pars.physics_pars,
            tick_duration: clock.dt,
            raining: director.raining(),
            total_laps: sim_pars.race_pars.tot_no_laps,
        };
        let gaps = gaps_ahead(store, track);

        let mut samples: Vec<(u32, MotionSample)> = Vec::with_capacity(store.len());
        let mut violations = vec![];

        for id in store.ids() {
            if !store.get(id)?.is_moving() {
                continue;
            }
            let gap_ahead = gaps.get(&id).copied().flatten();

            match store.update(id, |agent| step_agent(agent, &ctx, gap_ahead, rng)) {
                Ok(sample) => samples.push((id, sample)),
                Err(err) => {
                    let min_speed = sim_pars.physics_pars.min_speed;
                    let (name, lap) = store.update(id, |agent| {
                        freeze(agent, track, min_speed);
                        Ok((agent.name.to_owned(), agent.lap))
                    })?;
                    log::error!("Freezing agent {} after: {}", name, err);
                    director.emit(
                        clock,
                        lap,
                        Severity::Critical,
                        Some(id),
                        format!("{} frozen: {}", name, err),
                    );
                    violations.push(err);
                }
            }
        }

        director.process_motion(store, track, &samples, clock)?;
        director.evaluate_health(store, clock)?;
        director.update_standings(store, clock);

        // end of race
        let unfinished: Vec<&Agent> = store
            .all()
            .filter(|agent| agent.status != AgentStatus::Finished)
            .collect();
        let leader_lap = store.all().map(|agent| agent.lap).max().unwrap_or(0);

        if unfinished.is_empty() {
            director.emit(
                clock,
                leader_lap,
                Severity::Info,
                None,
                "Chequered flag, all agents finished".to_owned(),
            );
            self.status = SimStatus::Stopped;
        } else if unfinished.iter().all(|agent| agent.frozen) {
            director.emit(
                clock,
                leader_lap,
                Severity::Critical,
                None,
                "All remaining agents are frozen, simulation halted".to_owned(),
            );
            log::error!("All remaining agents are frozen at tick {}", clock.tick);
            self.status = SimStatus::Error;
        }

        log::trace!("Tick {} done at t={:.3}s", clock.tick, clock.time());
        self.violations = violations;

        Ok(self.publish())
    }

    /// Violations of the most recent tick.
    pub fn last_tick_violations(&self) -> &[SimError] {
        &self.violations
    }

    // ---------------------------------------------------------------------------------------------
    // QUERIES -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// snapshot returns the latest published snapshot without advancing the race.
    pub fn snapshot(&self) -> Arc<SimulationSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn agent(&self, id: u32) -> Result<Agent, SimError> {
        match &self.session {
            Some(session) => session.store.get(id).cloned(),
            None => Err(SimError::NotFound(id)),
        }
    }

    /// update_agent applies an external mutation to a single agent, e.g. to inject a fault. The
    /// change becomes visible in the snapshot of the next tick.
    pub fn update_agent<R, F>(&mut self, id: u32, mutator: F) -> Result<R, SimError>
    where
        F: FnOnce(&mut Agent) -> Result<R, SimError>,
    {
        match self.session.as_mut() {
            Some(session) => session.store.update(id, mutator),
            None => Err(SimError::NotFound(id)),
        }
    }

    fn publish(&mut self) -> Arc<SimulationSnapshot> {
        self.snapshot = Arc::new(self.build_snapshot());
        Arc::clone(&self.snapshot)
    }

    fn build_snapshot(&self) -> SimulationSnapshot {
        let (session, sim_pars) = match (&self.session, &self.sim_pars) {
            (Some(session), Some(sim_pars)) => (session, sim_pars),
            _ => return SimulationSnapshot::empty(self.status),
        };

        let ranked = standings(&session.store);
        let min_speed = sim_pars.physics_pars.min_speed;
        let agents = match ranked.first() {
            Some(leader) => ranked
                .iter()
                .enumerate()
                .map(|(i, agent)| RankedAgent {
                    rank: i as u32 + 1,
                    gap_to_leader: gap_to_leader(leader, agent, session.track.length, min_speed),
                    agent: (*agent).clone(),
                })
                .collect(),
            None => vec![],
        };

        SimulationSnapshot {
            tick: session.clock.tick,
            race_time: session.clock.time(),
            status: self.status,
            track: Some(session.track.id.to_owned()),
            total_laps: sim_pars.race_pars.tot_no_laps,
            weather: session.director.weather,
            agents,
            events: session.director.events.to_vec(),
        }
    }
}

/// freeze takes an agent out of the race after an invariant violation and replaces any
/// non-finite state by the last sane values.
fn freeze(agent: &mut Agent, track: &Track, min_speed: f64) {
    agent.frozen = true;
    agent.status = AgentStatus::Warning;

    if !agent.speed.is_finite() {
        agent.speed = min_speed;
    }
    if !agent.line_fraction.is_finite() {
        agent.line_fraction = 0.0;
    }
    if !agent.lane_offset.is_finite() {
        agent.lane_offset = 0.0;
    }
    if !(agent.position.is_finite() && agent.progress.is_finite()) {
        let (position, heading) = track.point_at(agent.line_fraction);
        agent.position = position;
        agent.heading = heading;
        agent.progress = track.progress_at(&position);
    }
    if !agent.heading.is_finite() {
        agent.heading = track.point_at(agent.progress).1;
    }
    if !agent.health.is_finite() {
        let fallback = Health::default();
        for (value, default) in [
            (&mut agent.health.battery, fallback.battery),
            (&mut agent.health.engine_temp, fallback.engine_temp),
            (&mut agent.health.tire_wear, fallback.tire_wear),
        ] {
            if !value.is_finite() {
                *value = default;
            }
        }
    }
}

/// gaps_ahead returns the on-track distance (m) from every unfinished agent to the next
/// unfinished agent in front of it, lapped cars included.
fn gaps_ahead(store: &AgentStore, track: &Track) -> BTreeMap<u32, Option<f64>> {
    let running: Vec<(u32, f64)> = store
        .all()
        .filter(|agent| agent.status != AgentStatus::Finished)
        .map(|agent| (agent.id, agent.progress))
        .collect();

    running
        .iter()
        .map(|(id, progress)| {
            let gap = running
                .iter()
                .filter(|(other, _)| other != id)
                .map(|(_, other_progress)| {
                    (other_progress - progress).rem_euclid(1.0) * track.length
                })
                .filter(|gap| *gap > 0.0)
                .fold(None, |closest: Option<f64>, gap| {
                    Some(closest.map_or(gap, |c| c.min(gap)))
                });
            (*id, gap)
        })
        .collect()
}

/// gap_to_leader estimates the time gap: the difference of finish times once both finished,
/// otherwise the distance behind divided by the current speed.
fn gap_to_leader(leader: &Agent, agent: &Agent, track_length: f64, min_speed: f64) -> f64 {
    if leader.id == agent.id {
        return 0.0;
    }
    match (leader.finish_time, agent.finish_time) {
        (Some(t_leader), Some(t_agent)) => t_agent - t_leader,
        _ => {
            let distance = (leader.race_progress() - agent.race_progress()).max(0.0) * track_length;
            distance / agent.speed.max(min_speed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::AgentPars;
    use crate::core::director::HazardPars;
    use crate::core::strategy::StrategyKind;

    fn quiet_pars() -> SimPars {
        SimPars {
            hazard_pars: HazardPars::none(),
            ..SimPars::default()
        }
    }

    #[test]
    fn lifecycle_follows_the_control_rules() {
        let mut engine = SimulationEngine::new(42);
        assert_eq!(engine.status(), SimStatus::Idle);
        assert_eq!(engine.tick().unwrap_err(), SimError::NotRunning);

        let snapshot = engine.start(quiet_pars()).unwrap();
        assert_eq!(snapshot.tick, 0);
        assert_eq!(snapshot.status, SimStatus::Running);
        assert_eq!(snapshot.agents.len(), 3);
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(
            engine.start(quiet_pars()).unwrap_err(),
            SimError::AlreadyRunning
        );
        assert!(matches!(engine.reset(), Err(SimError::InvalidState(_))));

        let snapshot = engine.tick().unwrap();
        assert_eq!(snapshot.tick, 1);
        assert!((snapshot.race_time - 0.2).abs() < 1e-12);

        let stopped = engine.stop();
        assert_eq!(stopped.status, SimStatus::Stopped);
        let again = engine.stop();
        assert_eq!(stopped, again);
        assert_eq!(engine.tick().unwrap_err(), SimError::NotRunning);

        let reset = engine.reset().unwrap();
        assert_eq!(reset.status, SimStatus::Idle);
        assert_eq!(reset.tick, 0);
        assert!(reset.events.is_empty());
        assert_eq!(reset.agents.len(), 3);
        assert!(reset.agents.iter().all(|ranked| ranked.agent.lap == 0));
    }

    #[test]
    fn rejected_configuration_leaves_the_engine_untouched() {
        let mut engine = SimulationEngine::new(1);
        engine.start(quiet_pars()).unwrap();
        engine.tick().unwrap();
        engine.stop();
        let before = engine.snapshot();

        let mut bad = quiet_pars();
        bad.race_pars.track = "nuerburgring".to_owned();
        assert!(matches!(
            engine.start(bad),
            Err(SimError::Configuration(_))
        ));

        let mut dup = quiet_pars();
        dup.agents.push(AgentPars::new("AlphaBot", StrategyKind::Balanced));
        assert!(matches!(
            engine.start(dup),
            Err(SimError::Configuration(_))
        ));

        assert_eq!(engine.status(), SimStatus::Stopped);
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.sim_pars(), Some(&quiet_pars()));
    }

    #[test]
    fn agent_queries() {
        let mut engine = SimulationEngine::new(3);
        assert_eq!(engine.agent(1).unwrap_err(), SimError::NotFound(1));

        engine.start(quiet_pars()).unwrap();
        assert_eq!(engine.agent(2).unwrap().name, "BetaBot");
        assert_eq!(engine.agent(9).unwrap_err(), SimError::NotFound(9));
        engine
            .update_agent(2, |agent| {
                agent.health.battery = 50.0;
                Ok(())
            })
            .unwrap();
        assert_eq!(engine.agent(2).unwrap().health.battery, 50.0);
    }

    #[test]
    fn nan_speed_freezes_only_the_culprit() {
        let mut engine = SimulationEngine::new(8);
        engine.start(quiet_pars()).unwrap();
        engine
            .update_agent(1, |agent| {
                agent.speed = f64::NAN;
                Ok(())
            })
            .unwrap();

        let snapshot = engine.tick().unwrap();
        assert_eq!(snapshot.status, SimStatus::Running);
        assert_eq!(engine.last_tick_violations().len(), 1);
        assert!(matches!(
            engine.last_tick_violations()[0],
            SimError::InvariantViolation { agent: 1, .. }
        ));

        let frozen = engine.agent(1).unwrap();
        assert!(frozen.frozen);
        assert_eq!(frozen.status, AgentStatus::Warning);
        assert!(frozen.speed.is_finite());
        assert!(snapshot
            .events
            .iter()
            .any(|e| e.severity == Severity::Critical && e.agent == Some(1)));

        let before = engine.agent(1).unwrap();
        engine.tick().unwrap();
        assert!(engine.last_tick_violations().is_empty());
        assert_eq!(engine.agent(1).unwrap(), before);
        assert!(engine.agent(2).unwrap().cumulative_time > 0.0);
    }

    #[test]
    fn all_frozen_means_error() {
        let mut pars = quiet_pars();
        pars.agents.truncate(1);
        let mut engine = SimulationEngine::new(8);
        engine.start(pars).unwrap();
        engine
            .update_agent(1, |agent| {
                agent.health.tire_wear = f64::NAN;
                Ok(())
            })
            .unwrap();

        let snapshot = engine.tick().unwrap();
        assert_eq!(snapshot.status, SimStatus::Error);
        assert_eq!(engine.tick().unwrap_err(), SimError::NotRunning);
        assert_eq!(engine.agent(1).unwrap().health.tire_wear, 100.0);
    }

    #[test]
    fn gaps_look_ahead_across_the_line() {
        let track = Track::builtin("square").unwrap();
        let pars = vec![
            AgentPars::new("AlphaBot", StrategyKind::Aggressive),
            AgentPars::new("BetaBot", StrategyKind::Balanced),
        ];
        let mut store = AgentStore::from_pars(&pars, &track, 5.0).unwrap();
        store
            .update(1, |agent| {
                agent.progress = 0.9;
                Ok(())
            })
            .unwrap();
        store
            .update(2, |agent| {
                agent.progress = 0.05;
                Ok(())
            })
            .unwrap();

        let gaps = gaps_ahead(&store, &track);
        assert!((gaps[&1].unwrap() - 60.0).abs() < 1e-9);
        assert!((gaps[&2].unwrap() - 340.0).abs() < 1e-9);
    }
}
