use crate::core::agent::Agent;
use crate::core::engine::SimulationEngine;
use crate::error::SimError;
use crate::interfaces::snapshot::SimulationSnapshot;
use crate::pre::read_sim_pars::SimPars;
use flume::{Receiver, Sender};
use std::sync::Arc;

pub type Reply<T> = Sender<Result<T, SimError>>;

/// Commands accepted by the simulation loop. They are applied between two ticks, the result is
/// sent back through the reply sender.
#[derive(Debug)]
pub enum ControlCommand {
    Start {
        sim_pars: SimPars,
        reply: Reply<Arc<SimulationSnapshot>>,
    },
    Stop {
        reply: Reply<Arc<SimulationSnapshot>>,
    },
    Reset {
        reply: Reply<Arc<SimulationSnapshot>>,
    },
    Agent {
        id: u32,
        reply: Reply<Agent>,
    },
    Shutdown,
}

impl ControlCommand {
    /// execute applies the command to the engine. Returns false if the loop should end.
    pub fn execute(self, engine: &mut SimulationEngine) -> bool {
        match self {
            ControlCommand::Start { sim_pars, reply } => {
                let res = engine.start(sim_pars);
                if let Err(e) = &res {
                    log::warn!("Start rejected: {}", e);
                }
                send_reply(&reply, res);
            }
            ControlCommand::Stop { reply } => send_reply(&reply, Ok(engine.stop())),
            ControlCommand::Reset { reply } => send_reply(&reply, engine.reset()),
            ControlCommand::Agent { id, reply } => send_reply(&reply, engine.agent(id)),
            ControlCommand::Shutdown => {
                log::info!("Simulation loop shutting down");
                return false;
            }
        }
        true
    }
}

fn send_reply<T>(reply: &Reply<T>, res: Result<T, SimError>) {
    if reply.send(res).is_err() {
        log::debug!("Requester went away before the reply was sent");
    }
}

/// ControlHandle is the requesting side of the control channel. It is cheap to clone, every
/// request blocks until the simulation loop answered it.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Sender<ControlCommand>,
}

impl ControlHandle {
    pub fn new(tx: Sender<ControlCommand>) -> ControlHandle {
        ControlHandle { tx }
    }

    /// channel creates a handle together with the receiver the simulation loop listens on.
    pub fn channel() -> (ControlHandle, Receiver<ControlCommand>) {
        let (tx, rx) = flume::unbounded();
        (ControlHandle::new(tx), rx)
    }

    fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ControlCommand,
    ) -> Result<T, SimError> {
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.tx
            .send(build(reply_tx))
            .map_err(|_| SimError::invalid_state("The simulation loop is not running"))?;
        reply_rx
            .recv()
            .map_err(|_| SimError::invalid_state("The simulation loop dropped the request"))?
    }

    pub fn start(&self, sim_pars: SimPars) -> Result<Arc<SimulationSnapshot>, SimError> {
        self.request(|reply| ControlCommand::Start { sim_pars, reply })
    }

    pub fn stop(&self) -> Result<Arc<SimulationSnapshot>, SimError> {
        self.request(|reply| ControlCommand::Stop { reply })
    }

    pub fn reset(&self) -> Result<Arc<SimulationSnapshot>, SimError> {
        self.request(|reply| ControlCommand::Reset { reply })
    }

    pub fn agent(&self, id: u32) -> Result<Agent, SimError> {
        self.request(|reply| ControlCommand::Agent { id, reply })
    }

    pub fn shutdown(&self) {
        if self.tx.send(ControlCommand::Shutdown).is_err() {
            log::debug!("Simulation loop already gone");
        }
    }
}
