use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "raceserver",
    about = "A deterministic multi-agent race simulation with an HTTP polling interface"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[clap(short, long)]
    pub debug: bool,

    /// Serve the simulation over HTTP instead of running headless races
    #[clap(short, long)]
    pub serve: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (a Monte Carlo batch if greater than one)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file (OPTIONAL: the built-in three bot race is used
    /// if not set)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set real-time factor of the served simulation
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Override the tick duration of the parameter file in seconds, range (0, 1]
    #[clap(short, long)]
    pub timestep_size: Option<f64>,

    /// Set the seed of the (first) simulation run
    #[clap(long, default_value = "42")]
    pub seed: u64,

    /// Set the listen address of the HTTP server
    #[clap(short, long, default_value = "127.0.0.1:8000")]
    pub addr: String,

    /// Set the directory searched for <track>.csv files
    #[clap(long)]
    pub tracks_dir: Option<PathBuf>,

    /// Agent whose win probability a Monte Carlo batch estimates (default: first agent)
    #[clap(long)]
    pub target: Option<String>,

    /// Write the lap and race time table of a single race to this file
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}
