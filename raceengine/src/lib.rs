//! A deterministic, steppable multi-agent race simulation.
//!
//! `core` holds the engine itself, `interfaces` the values shared with pollers and control
//! loops, `pre` the parameter handling and `post` the evaluation of finished races.

pub mod error;

pub mod core {
    pub mod agent;
    pub mod agent_store;
    pub mod director;
    pub mod engine;
    pub mod event_log;
    pub mod handle_race;
    pub mod stepper;
    pub mod strategy;
    pub mod track;
}

pub mod interfaces {
    pub mod control;
    pub mod snapshot;
    pub mod wire;
}

pub mod pre {
    pub mod read_sim_pars;
    pub mod sim_opts;
}

pub mod post {
    pub mod monte_carlo;
    pub mod race_result;
}

pub use crate::core::engine::SimulationEngine;
pub use crate::error::SimError;
