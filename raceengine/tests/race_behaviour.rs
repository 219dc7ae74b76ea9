use raceengine::core::agent::AgentStatus;
use raceengine::core::director::{HazardKind, HazardPars, ScheduledEvent};
use raceengine::core::engine::SimStatus;
use raceengine::core::event_log::Severity;
use raceengine::core::track::TrackCatalog;
use raceengine::interfaces::snapshot::SimulationSnapshot;
use raceengine::post::monte_carlo::run_monte_carlo;
use raceengine::pre::read_sim_pars::SimPars;
use raceengine::{SimError, SimulationEngine};
use std::sync::Arc;

fn calm_race(track: &str) -> SimPars {
    let mut sim_pars = SimPars {
        hazard_pars: HazardPars::none(),
        ..SimPars::default()
    };
    sim_pars.race_pars.track = track.to_owned();
    sim_pars
}

fn run_ticks(engine: &mut SimulationEngine, no_ticks: usize) -> Vec<String> {
    (0..no_ticks)
        .map(|_| {
            let snapshot = engine.tick().unwrap();
            serde_json::to_string(snapshot.as_ref()).unwrap()
        })
        .collect()
}

fn id_of(snapshot: &SimulationSnapshot, name: &str) -> u32 {
    snapshot
        .agents
        .iter()
        .find(|ranked| ranked.agent.name == name)
        .map(|ranked| ranked.agent.id)
        .unwrap()
}

#[test]
fn same_seed_gives_identical_snapshots() {
    let mut a = SimulationEngine::new(7);
    let mut b = SimulationEngine::new(7);
    a.start(SimPars::default()).unwrap();
    b.start(SimPars::default()).unwrap();

    assert_eq!(run_ticks(&mut a, 300), run_ticks(&mut b, 300));

    a.stop();
    a.reset().unwrap();
    a.start(SimPars::default()).unwrap();
    let mut c = SimulationEngine::new(8);
    c.start(SimPars::default()).unwrap();
    assert_ne!(run_ticks(&mut a, 50), run_ticks(&mut c, 50));
}

#[test]
fn stop_reset_start_reproduces_the_first_run() {
    let mut engine = SimulationEngine::new(42);
    engine.start(SimPars::default()).unwrap();
    let first = run_ticks(&mut engine, 120);

    engine.stop();
    let idle = engine.reset().unwrap();
    assert_eq!(idle.status, SimStatus::Idle);
    assert_eq!(idle.tick, 0);
    assert!(matches!(engine.tick(), Err(SimError::NotRunning)));

    engine.start(SimPars::default()).unwrap();
    let second = run_ticks(&mut engine, 120);
    assert_eq!(first, second);
}

#[test]
fn aggressive_driver_wears_tyres_faster() {
    let mut engine = SimulationEngine::new(42);
    let started = engine.start(SimPars::default()).unwrap();
    assert_eq!(started.track.as_deref(), Some("monaco"));
    let alpha = id_of(&started, "AlphaBot");
    let gamma = id_of(&started, "GammaBot");

    let mut snapshot = started;
    for _ in 0..10 {
        snapshot = engine.tick().unwrap();
    }

    let wear = |id: u32| snapshot.agent(id).unwrap().agent.cumulative_tire_wear;
    assert!(wear(alpha) > wear(gamma));
}

#[test]
fn overheating_triggers_a_warning_on_the_next_tick() {
    let mut engine = SimulationEngine::new(42);
    engine.start(calm_race("monaco")).unwrap();
    engine.tick().unwrap();
    engine.tick().unwrap();

    let lap = engine
        .update_agent(2, |agent| {
            agent.health.engine_temp = 95.0;
            Ok(agent.lap)
        })
        .unwrap();
    assert_eq!(engine.agent(2).unwrap().status, AgentStatus::Active);

    let snapshot = engine.tick().unwrap();
    assert_eq!(snapshot.tick, 3);
    assert_eq!(snapshot.agent(2).unwrap().agent.status, AgentStatus::Warning);

    let warning = snapshot
        .events
        .iter()
        .find(|e| e.severity == Severity::Warning && e.agent == Some(2))
        .unwrap();
    assert_eq!(warning.tick, 3);
    assert_eq!(warning.lap, lap);
    assert!(warning.message.contains("engine temperature"));

    for id in [1, 3] {
        assert_eq!(snapshot.agent(id).unwrap().agent.status, AgentStatus::Active);
    }
}

#[test]
fn worn_tyres_lead_to_a_pit_stop() {
    let mut engine = SimulationEngine::new(3);
    let mut sim_pars = calm_race("square");
    sim_pars.race_pars.tot_no_laps = 20;
    let pit_duration = sim_pars.race_pars.pit_duration;
    let tick_duration = sim_pars.race_pars.tick_duration;
    engine.start(sim_pars).unwrap();

    // BetaBot is balanced and pits below 10 % tread
    engine
        .update_agent(2, |agent| {
            agent.health.tire_wear = 5.0;
            Ok(())
        })
        .unwrap();

    let snapshot = engine.tick().unwrap();
    assert_eq!(snapshot.agent(2).unwrap().agent.status, AgentStatus::Warning);
    let snapshot = engine.tick().unwrap();
    let beta = &snapshot.agent(2).unwrap().agent;
    assert_eq!(beta.status, AgentStatus::Pit);
    assert_eq!(beta.pit_stops, 1);

    let no_pit_ticks = (pit_duration / tick_duration).round() as usize;
    let mut snapshot = snapshot;
    for _ in 0..no_pit_ticks {
        snapshot = engine.tick().unwrap();
    }
    let beta = &snapshot.agent(2).unwrap().agent;
    assert_eq!(beta.status, AgentStatus::Active);
    assert!(beta.health.tire_wear > 99.0);
    assert!(snapshot
        .events
        .iter()
        .any(|e| e.message == "BetaBot rejoins on fresh tyres"));
}

#[test]
fn scheduled_engine_failure_slows_the_agent_until_it_recovers() {
    let mut engine = SimulationEngine::new(9);
    let mut sim_pars = calm_race("square");
    sim_pars.hazard_pars.scheduled_events = vec![ScheduledEvent {
        kind: HazardKind::EngineFailure,
        time: 1.0,
        agent: Some(1),
        duration: Some(2.0),
    }];
    engine.start(sim_pars).unwrap();

    let mut failed_ticks = 0;
    let mut messages = Vec::new();
    for _ in 0..40 {
        let snapshot = engine.tick().unwrap();
        let agent = &snapshot.agent(1).unwrap().agent;
        if agent.engine_failed() {
            failed_ticks += 1;
        }
        for event in snapshot.events.iter().filter(|e| e.agent == Some(1)) {
            if !messages.contains(&event.message) {
                messages.push(event.message.to_owned());
            }
        }
    }

    assert_eq!(failed_ticks, 10);
    assert!(!engine.agent(1).unwrap().engine_failed());
    assert!(messages.contains(&"AlphaBot suffers an engine failure (2.0s)".to_owned()));
    assert!(messages.contains(&"AlphaBot engine recovered".to_owned()));
}

#[test]
fn event_log_keeps_the_newest_entries() {
    let mut engine = SimulationEngine::new(11);
    let mut sim_pars = calm_race("square");
    sim_pars.race_pars.event_retention = 4;
    sim_pars.race_pars.tot_no_laps = 50;
    engine.start(sim_pars).unwrap();

    let mut snapshot = engine.snapshot();
    for _ in 0..200 {
        snapshot = engine.tick().unwrap();
        assert!(snapshot.events.len() <= 4);
    }

    assert_eq!(snapshot.events.len(), 4);
    assert!(!snapshot.events[0].message.starts_with("Race started"));
    for pair in snapshot.events.windows(2) {
        assert!(pair[0].tick <= pair[1].tick);
    }
}

#[test]
fn full_race_classifies_every_agent() {
    let mut engine = SimulationEngine::new(5);
    let mut sim_pars = calm_race("oval");
    sim_pars.race_pars.tot_no_laps = 2;
    engine.start(sim_pars).unwrap();

    let mut snapshot: Arc<SimulationSnapshot> = engine.snapshot();
    while snapshot.status == SimStatus::Running {
        snapshot = engine.tick().unwrap();
        assert!(snapshot.tick < 20_000);
    }

    assert_eq!(snapshot.status, SimStatus::Stopped);
    let positions: Vec<Option<u32>> = snapshot
        .agents
        .iter()
        .map(|ranked| ranked.agent.finish_position)
        .collect();
    assert_eq!(positions, vec![Some(1), Some(2), Some(3)]);
    for ranked in snapshot.agents.iter() {
        assert_eq!(ranked.agent.lap, 2);
        assert_eq!(ranked.agent.lap_times.len(), 2);
        assert_eq!(ranked.agent.status, AgentStatus::Finished);
    }
}

#[test]
fn rejected_configurations_leave_the_engine_idle() {
    let mut engine = SimulationEngine::new(1);

    let mut unknown_track = SimPars::default();
    unknown_track.race_pars.track = "atlantis".to_owned();
    let mut no_agents = SimPars::default();
    no_agents.agents.clear();
    let mut bad_color = SimPars::default();
    bad_color.agents[0].color = Some("not-a-colour".to_owned());
    let mut duplicate_id = SimPars::default();
    duplicate_id.agents[0].id = Some(2);

    for sim_pars in [unknown_track, no_agents, bad_color, duplicate_id] {
        assert!(matches!(
            engine.start(sim_pars),
            Err(SimError::Configuration(_))
        ));
        assert_eq!(engine.status(), SimStatus::Idle);
    }
}

#[test]
fn monte_carlo_is_deterministic_for_a_base_seed() {
    let mut sim_pars = calm_race("square");
    sim_pars.race_pars.tot_no_laps = 2;
    sim_pars.hazard_pars = HazardPars::default();
    let catalog = TrackCatalog::new();

    let a = run_monte_carlo(&sim_pars, &catalog, "BetaBot", 8, 100).unwrap();
    let b = run_monte_carlo(&sim_pars, &catalog, "BetaBot", 8, 100).unwrap();
    assert_eq!(a, b);

    assert_eq!(a.runs, 8);
    assert!((0.0..=1.0).contains(&a.win_prob));
    assert!(a.ci_low <= a.win_prob && a.win_prob <= a.ci_high);
    assert!(a.ci_time_low <= a.mean_finish_time && a.mean_finish_time <= a.ci_time_high);
    assert!(a.formatted().starts_with("Monte Carlo estimated win probability for BetaBot"));
}
