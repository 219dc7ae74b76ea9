use crate::core::engine::{SimStatus, SimulationEngine};
use crate::core::track::TrackCatalog;
use crate::error::SimError;
use crate::interfaces::control::ControlCommand;
use crate::interfaces::snapshot::{SimulationSnapshot, SnapshotCell};
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::SimPars;
use anyhow::Context;
use flume::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// run_to_completion starts a race and ticks it until every agent finished, the race was halted
/// or `max_race_time` passed. `on_tick` sees every snapshot after the start.
pub fn run_to_completion<F>(
    engine: &mut SimulationEngine,
    sim_pars: SimPars,
    mut on_tick: F,
) -> Result<RaceResult, SimError>
where
    F: FnMut(&SimulationSnapshot, &SimulationEngine),
{
    let max_race_time = sim_pars.race_pars.max_race_time;
    let mut snapshot = engine.start(sim_pars)?;

    while snapshot.status == SimStatus::Running {
        if snapshot.race_time >= max_race_time {
            log::warn!(
                "Race not finished after {:.1}s, stopping it",
                snapshot.race_time
            );
            snapshot = engine.stop();
            break;
        }
        snapshot = engine.tick()?;
        on_tick(&snapshot, &*engine);
    }

    Ok(RaceResult::from_snapshot(&snapshot))
}

/// handle_race creates and simulates a race on the basis of the inserted parameters, and returns
/// the results for post-processing.
pub fn handle_race(
    sim_pars: &SimPars,
    seed: u64,
    catalog: TrackCatalog,
) -> anyhow::Result<RaceResult> {
    let mut engine = SimulationEngine::with_catalog(seed, catalog);

    let mut t_race_update_print = 0.0;
    let mut last_printed_lap = 0;

    let race_result = run_to_completion(&mut engine, sim_pars.to_owned(), |snapshot, engine| {
        if snapshot.race_time > t_race_update_print + 9.9999 {
            log::debug!(
                "Simulating... Current race time is {:.3}s, current lap is {}",
                snapshot.race_time,
                snapshot.leader().map_or(0, |leader| leader.lap)
            );
            t_race_update_print = snapshot.race_time;
        }
        if let Some(leader) = snapshot.leader() {
            if leader.lap > last_printed_lap {
                log::debug!("Leader {} started lap {}", leader.name, leader.lap + 1);
                last_printed_lap = leader.lap;
            }
        }
        for violation in engine.last_tick_violations() {
            log::warn!("Tick {}: {}", snapshot.tick, violation);
        }
    })
    .context(format!(
        "Failed to simulate the race on {}!",
        sim_pars.race_pars.track
    ))?;

    if race_result.status == SimStatus::Error {
        log::error!("Race ended with every remaining agent frozen");
    }

    Ok(race_result)
}

/// run_realtime owns the engine for the lifetime of a server. While a race is running it ticks
/// at `tick_duration / realtime_factor` and applies control commands between two ticks;
/// otherwise it sleeps until the next command. Every change is published to `cell`.
pub fn run_realtime(
    mut engine: SimulationEngine,
    rx: Receiver<ControlCommand>,
    cell: Arc<SnapshotCell>,
    realtime_factor: f64,
) -> anyhow::Result<()> {
    if !(realtime_factor.is_finite() && realtime_factor > 0.0) {
        anyhow::bail!("Real-time factor must be positive, got {}!", realtime_factor);
    }

    cell.publish(engine.snapshot());
    let period = |engine: &SimulationEngine| {
        Duration::from_secs_f64(engine.tick_duration() / realtime_factor)
    };
    let mut next_tick = Instant::now();

    loop {
        if engine.status() != SimStatus::Running {
            let command = match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            };
            let keep_running = command.execute(&mut engine);
            cell.publish(engine.snapshot());
            if !keep_running {
                break;
            }
            next_tick = Instant::now() + period(&engine);
            continue;
        }

        match rx.recv_deadline(next_tick) {
            Ok(command) => {
                let keep_running = command.execute(&mut engine);
                cell.publish(engine.snapshot());
                if !keep_running {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        match engine.tick() {
            Ok(snapshot) => {
                for violation in engine.last_tick_violations() {
                    log::warn!("Tick {}: {}", snapshot.tick, violation);
                }
                cell.publish(snapshot);
            }
            Err(e) => log::error!("Tick failed: {}", e),
        }

        next_tick += period(&engine);
        let now = Instant::now();
        if next_tick < now {
            log::warn!("Could not keep up with real-time!");
            next_tick = now;
        }
    }

    log::info!("Simulation loop finished");
    Ok(())
}
