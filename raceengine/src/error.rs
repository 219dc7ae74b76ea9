//! Error types of the race engine.

use thiserror::Error;

/// Errors surfaced by the engine API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// The race configuration was rejected by `start()`; the engine state is unchanged.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `start()` was called while a race is running.
    #[error("Simulation is already running")]
    AlreadyRunning,

    /// `tick()` was called without a running race.
    #[error("Simulation is not running")]
    NotRunning,

    /// The operation is not legal in the current engine status.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Unknown agent id.
    #[error("Agent {0} not found")]
    NotFound(u32),

    /// An agent reached a physically impossible state during a tick. The agent is frozen, the
    /// rest of the field keeps racing.
    #[error("Invariant violation for agent {agent}: {detail}")]
    InvariantViolation { agent: u32, detail: String },
}

impl SimError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
