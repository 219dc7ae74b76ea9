use proptest::prelude::*;
use raceengine::core::agent::AgentStatus;
use raceengine::core::engine::SimStatus;
use raceengine::pre::read_sim_pars::SimPars;
use raceengine::SimulationEngine;
use std::collections::HashMap;

fn track_id() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("monaco"), Just("oval"), Just("square")]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn race_invariants_hold(seed in any::<u64>(), no_ticks in 1usize..400, track in track_id()) {
        let mut sim_pars = SimPars::default();
        sim_pars.race_pars.track = track.to_owned();
        let physics = sim_pars.physics_pars.to_owned();

        let mut engine = SimulationEngine::new(seed);
        engine.start(sim_pars).unwrap();
        let mut laps: HashMap<u32, u32> = HashMap::new();

        for _ in 0..no_ticks {
            if engine.status() != SimStatus::Running {
                break;
            }
            let snapshot = engine.tick().unwrap();
            prop_assert!(engine.last_tick_violations().is_empty());

            for (i, ranked) in snapshot.agents.iter().enumerate() {
                let agent = &ranked.agent;
                prop_assert_eq!(ranked.rank as usize, i + 1);
                prop_assert!(agent.speed >= physics.min_speed && agent.speed <= physics.max_speed);
                prop_assert!((0.0..1.0).contains(&agent.progress));

                let prev_lap = laps.insert(agent.id, agent.lap).unwrap_or(0);
                prop_assert!(agent.lap >= prev_lap);
            }

            // finishers lead in finishing order, the rest by lap, progress and id
            for pair in snapshot.agents.windows(2) {
                let (a, b) = (&pair[0].agent, &pair[1].agent);
                match (a.finish_position, b.finish_position) {
                    (Some(pa), Some(pb)) => prop_assert!(pa < pb),
                    (Some(_), None) => {}
                    (None, Some(_)) => prop_assert!(false, "finisher behind a running agent"),
                    (None, None) => prop_assert!(
                        a.lap > b.lap
                            || (a.lap == b.lap && a.progress > b.progress)
                            || (a.lap == b.lap && a.progress == b.progress && a.id < b.id)
                    ),
                }
                if b.status != AgentStatus::Finished {
                    prop_assert!(pair[1].gap_to_leader >= 0.0);
                }
            }
        }
    }
}
