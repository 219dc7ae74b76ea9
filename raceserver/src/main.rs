mod http;

use anyhow::Context;
use clap::Parser;
use raceengine::core::handle_race::{handle_race, run_realtime};
use raceengine::core::track::TrackCatalog;
use raceengine::interfaces::control::ControlHandle;
use raceengine::interfaces::snapshot::SnapshotCell;
use raceengine::post::monte_carlo::run_monte_carlo;
use raceengine::pre::read_sim_pars::{read_sim_pars, SimPars};
use raceengine::pre::sim_opts::SimOpts;
use raceengine::SimulationEngine;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    let default_level = if sim_opts.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // get simulation parameters
    let mut sim_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        log::info!("Reading simulation parameters from {:?}", parfile_path);
        read_sim_pars(parfile_path)?
    } else {
        log::info!("No parameter file given, using the built-in race");
        SimPars::default()
    };
    if let Some(timestep_size) = sim_opts.timestep_size {
        sim_pars.race_pars.tick_duration = timestep_size;
    }

    let catalog = match &sim_opts.tracks_dir {
        Some(dir) => TrackCatalog::with_tracks_dir(dir),
        None => TrackCatalog::new(),
    };

    // EXECUTION -----------------------------------------------------------------------------------
    if sim_opts.serve {
        // SERVER CASE - the simulation loop owns the engine, the HTTP server talks to it
        if !(sim_opts.realtime_factor.is_finite() && sim_opts.realtime_factor > 0.0) {
            anyhow::bail!("Real-time factor must be positive!");
        }
        let (control, rx) = ControlHandle::channel();
        let cell = Arc::new(SnapshotCell::default());

        let engine = SimulationEngine::with_catalog(sim_opts.seed, catalog.to_owned());
        let loop_cell = Arc::clone(&cell);
        let realtime_factor = sim_opts.realtime_factor;
        let sim_loop = thread::spawn(move || run_realtime(engine, rx, loop_cell, realtime_factor));

        let ctx = http::ApiContext {
            control: control.to_owned(),
            cell,
            base_pars: sim_pars,
            catalog,
            seed: sim_opts.seed,
        };
        let served = http::serve(&sim_opts.addr, ctx);

        control.shutdown();
        match sim_loop.join() {
            Ok(res) => res.context("Simulation loop failed!")?,
            Err(_) => anyhow::bail!("Simulation loop panicked!"),
        }
        served?;
    } else if sim_opts.no_sim_runs > 1 {
        // MONTE CARLO CASE
        let target = match &sim_opts.target {
            Some(target) => target.to_owned(),
            None => sim_pars
                .agents
                .first()
                .map(|agent| agent.name.to_owned())
                .context("No agent configured!")?,
        };
        let t_start = Instant::now();

        let result = run_monte_carlo(
            &sim_pars,
            &catalog,
            &target,
            sim_opts.no_sim_runs,
            sim_opts.seed,
        )
        .context("Monte Carlo batch failed!")?;

        log::info!(
            "Execution time: {}ms ({:.1}ms per race)",
            t_start.elapsed().as_millis(),
            t_start.elapsed().as_secs_f64() * 1000.0 / sim_opts.no_sim_runs as f64
        );
        println!("{}", result.formatted());
    } else {
        // SINGLE RACE CASE
        log::info!(
            "Simulating {} laps on {} with a time step size of {:.3}s",
            sim_pars.race_pars.tot_no_laps,
            sim_pars.race_pars.track,
            sim_pars.race_pars.tick_duration
        );
        let t_start = Instant::now();

        let race_result = handle_race(&sim_pars, sim_opts.seed, catalog)?;

        log::info!("Execution time: {}ms", t_start.elapsed().as_millis());
        race_result.print_lap_and_race_times();

        if let Some(output) = &sim_opts.output {
            let path = race_result
                .write_lap_and_race_times_to_file(output)
                .with_context(|| format!("Could not write the result to {:?}", output))?;
            log::info!("Result written to {}", path);
        }
    }

    Ok(())
}
