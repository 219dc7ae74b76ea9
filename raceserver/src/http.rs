use raceengine::core::track::TrackCatalog;
use raceengine::interfaces::control::ControlHandle;
use raceengine::interfaces::snapshot::{SimulationSnapshot, SnapshotCell};
use raceengine::interfaces::wire::{ErrorResponse, MonteCarloRequest, StartRequest, StateResponse};
use raceengine::post::monte_carlo::run_monte_carlo;
use raceengine::pre::read_sim_pars::SimPars;
use raceengine::SimError;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Method, Request, Response, Server};

/// Upper limit of the runs of one Monte Carlo request.
const MAX_MC_RUNS: u32 = 10_000;

/// Number of threads answering requests, a running Monte Carlo batch occupies one of them.
const NO_WORKERS: usize = 4;

/// ApiContext bundles everything a request handler needs. Control requests go through the
/// simulation loop, state requests read the latest published snapshot.
pub struct ApiContext {
    pub control: ControlHandle,
    pub cell: Arc<SnapshotCell>,
    pub base_pars: SimPars,
    pub catalog: TrackCatalog,
    pub seed: u64,
}

fn json<T: Serialize>(status: u16, body: &T) -> (u16, String) {
    match serde_json::to_string(body) {
        Ok(s) => (status, s),
        Err(e) => error_body(500, &format!("Could not serialize the response: {}", e)),
    }
}

fn error_body(status: u16, msg: &str) -> (u16, String) {
    let body = ErrorResponse {
        error: msg.to_owned(),
    };
    (
        status,
        serde_json::to_string(&body).unwrap_or_else(|_| String::from("{}")),
    )
}

fn status_of(e: &SimError) -> u16 {
    match e {
        SimError::Configuration(_) => 400,
        SimError::NotFound(_) => 404,
        SimError::AlreadyRunning | SimError::NotRunning | SimError::InvalidState(_) => 409,
        SimError::InvariantViolation { .. } => 500,
    }
}

fn from_error(e: &SimError) -> (u16, String) {
    error_body(status_of(e), &e.to_string())
}

fn state(snapshot: &SimulationSnapshot) -> (u16, String) {
    json(200, &StateResponse::from(snapshot))
}

fn parse_body<T: serde::de::DeserializeOwned + Default>(body: &str) -> Result<T, (u16, String)> {
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(body).map_err(|e| error_body(400, &format!("Invalid request body: {}", e)))
}

fn monte_carlo(ctx: &ApiContext, body: &str) -> (u16, String) {
    let req = match parse_body::<MonteCarloRequest>(body) {
        Ok(req) => req,
        Err(res) => return res,
    };
    if req.runs > MAX_MC_RUNS {
        return error_body(
            400,
            &format!("At most {} runs are allowed per request!", MAX_MC_RUNS),
        );
    }

    let sim_pars = match &req.config {
        Some(config) => config.apply_to(&ctx.base_pars),
        None => ctx.base_pars.to_owned(),
    };
    let target = match req
        .target
        .or_else(|| sim_pars.agents.first().map(|agent| agent.name.to_owned()))
    {
        Some(target) => target,
        None => return error_body(400, "No agent configured!"),
    };

    match run_monte_carlo(&sim_pars, &ctx.catalog, &target, req.runs, ctx.seed) {
        Ok(result) => json(200, &result),
        Err(e) => from_error(&e),
    }
}

/// route answers one request with a status code and a JSON body.
pub fn route(ctx: &ApiContext, method: &Method, url: &str, body: &str) -> (u16, String) {
    let path = url.split('?').next().unwrap_or(url).trim_end_matches('/');

    match (method, path) {
        (Method::Get, "/simulation/state") => state(&ctx.cell.load()),
        (Method::Post, "/simulation/start") => {
            let req = match parse_body::<StartRequest>(body) {
                Ok(req) => req,
                Err(res) => return res,
            };
            match ctx.control.start(req.apply_to(&ctx.base_pars)) {
                Ok(snapshot) => state(&snapshot),
                Err(e) => from_error(&e),
            }
        }
        (Method::Post, "/simulation/stop") => match ctx.control.stop() {
            Ok(snapshot) => state(&snapshot),
            Err(e) => from_error(&e),
        },
        (Method::Post, "/simulation/reset") => match ctx.control.reset() {
            Ok(snapshot) => state(&snapshot),
            Err(e) => from_error(&e),
        },
        (Method::Get, p) if p.starts_with("/simulation/agents/") => {
            let id = &p["/simulation/agents/".len()..];
            match id.parse::<u32>() {
                Ok(id) => match ctx.control.agent(id) {
                    Ok(agent) => json(200, &agent),
                    Err(e) => from_error(&e),
                },
                Err(_) => error_body(404, &format!("No agent with id {}", id)),
            }
        }
        (Method::Post, "/montecarlo/run") => monte_carlo(ctx, body),
        _ => error_body(404, "not found"),
    }
}

fn handle(ctx: &ApiContext, mut request: Request) {
    let mut body = String::new();
    let (status, payload) = match request.as_reader().read_to_string(&mut body) {
        Ok(_) => route(ctx, request.method(), request.url(), &body),
        Err(e) => error_body(400, &format!("Could not read the request body: {}", e)),
    };
    log::debug!("{} {} -> {}", request.method(), request.url(), status);

    let mut response = Response::from_string(payload).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        log::warn!("Could not send the response: {}", e);
    }
}

/// serve answers requests on `addr` until the server fails.
pub fn serve(addr: &str, ctx: ApiContext) -> anyhow::Result<()> {
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("Could not listen on {}: {}", addr, e))?;
    log::info!(
        "Serving the simulation on http://{} with {} workers",
        addr,
        NO_WORKERS
    );

    serve_with(Arc::new(server), Arc::new(ctx), NO_WORKERS)
}

/// serve_with lets `no_workers` threads take requests from `server`. Each worker ends when
/// `recv` fails, e.g. after `Server::unblock`.
pub fn serve_with(
    server: Arc<Server>,
    ctx: Arc<ApiContext>,
    no_workers: usize,
) -> anyhow::Result<()> {
    let workers: Vec<_> = (0..no_workers)
        .map(|worker| {
            let server = Arc::clone(&server);
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || loop {
                match server.recv() {
                    Ok(request) => handle(&ctx, request),
                    Err(e) => {
                        log::debug!("HTTP worker {} stops: {}", worker, e);
                        break;
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        if worker.join().is_err() {
            anyhow::bail!("HTTP worker panicked!");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use raceengine::core::director::HazardPars;
    use raceengine::core::handle_race::run_realtime;
    use raceengine::SimulationEngine;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn context() -> (ApiContext, thread::JoinHandle<anyhow::Result<()>>) {
        let (control, rx) = ControlHandle::channel();
        let cell = Arc::new(SnapshotCell::default());
        let worker = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || run_realtime(SimulationEngine::new(42), rx, cell, 1.0))
        };
        let mut base_pars = SimPars {
            hazard_pars: HazardPars::none(),
            ..SimPars::default()
        };
        base_pars.race_pars.track = "square".to_owned();
        base_pars.race_pars.tot_no_laps = 3;

        let ctx = ApiContext {
            control,
            cell,
            base_pars,
            catalog: TrackCatalog::new(),
            seed: 42,
        };
        (ctx, worker)
    }

    fn send(addr: SocketAddr, method: &str, path: &str, body: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(
            stream,
            "{} {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            method,
            path,
            body.len(),
            body
        )
        .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).unwrap();

        let status = raw.split_whitespace().nth(1).unwrap().parse().unwrap();
        let payload = raw.split("\r\n\r\n").nth(1).unwrap_or("").to_owned();
        (status, payload)
    }

    fn value(res: &(u16, String)) -> serde_json::Value {
        serde_json::from_str(&res.1).unwrap()
    }

    #[test]
    fn control_endpoints() {
        let (ctx, worker) = context();

        let res = route(&ctx, &Method::Get, "/simulation/state", "");
        assert_eq!(res.0, 200);
        assert_eq!(value(&res)["status"], "idle");

        let res = route(&ctx, &Method::Post, "/simulation/start", r#"{"track": "nowhere"}"#);
        assert_eq!(res.0, 400);
        assert!(value(&res)["error"].is_string());

        let res = route(&ctx, &Method::Post, "/simulation/start", "");
        assert_eq!(res.0, 200);
        assert_eq!(value(&res)["status"], "running");
        assert_eq!(value(&res)["agents"].as_array().unwrap().len(), 3);

        assert_eq!(route(&ctx, &Method::Post, "/simulation/start", "").0, 409);
        assert_eq!(route(&ctx, &Method::Post, "/simulation/reset", "").0, 409);

        let res = route(&ctx, &Method::Get, "/simulation/agents/2", "");
        assert_eq!(res.0, 200);
        assert_eq!(value(&res)["name"], "BetaBot");
        assert_eq!(route(&ctx, &Method::Get, "/simulation/agents/9", "").0, 404);
        assert_eq!(route(&ctx, &Method::Get, "/simulation/agents/x", "").0, 404);

        assert_eq!(route(&ctx, &Method::Post, "/simulation/stop", "").0, 200);
        assert_eq!(route(&ctx, &Method::Post, "/simulation/stop", "").0, 200);
        let res = route(&ctx, &Method::Post, "/simulation/reset", "");
        assert_eq!(res.0, 200);
        assert_eq!(value(&res)["tick"], 0);

        assert_eq!(route(&ctx, &Method::Get, "/nothing/here", "").0, 404);
        assert_eq!(route(&ctx, &Method::Get, "/simulation/start", "").0, 404);

        ctx.control.shutdown();
        worker.join().unwrap().unwrap();
    }

    #[test]
    fn monte_carlo_endpoint() {
        let (ctx, worker) = context();

        let res = route(
            &ctx,
            &Method::Post,
            "/montecarlo/run",
            r#"{"target": "AlphaBot", "runs": 4}"#,
        );
        assert_eq!(res.0, 200);
        let mc = value(&res);
        assert_eq!(mc["runs"], 4);
        let p = mc["win_prob"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&p));

        let res = route(&ctx, &Method::Post, "/montecarlo/run", r#"{"target": "Nobody"}"#);
        assert_eq!(res.0, 400);
        let res = route(&ctx, &Method::Post, "/montecarlo/run", r#"{"runs": 0}"#);
        assert_eq!(res.0, 400);

        ctx.control.shutdown();
        worker.join().unwrap().unwrap();
    }

    #[test]
    fn state_answers_while_a_batch_runs() {
        let (ctx, worker) = context();
        let control = ctx.control.to_owned();
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let serving = {
            let server = Arc::clone(&server);
            thread::spawn(move || serve_with(server, Arc::new(ctx), 2))
        };

        let batch_done = Arc::new(AtomicBool::new(false));
        let batch = {
            let batch_done = Arc::clone(&batch_done);
            thread::spawn(move || {
                let res = send(addr, "POST", "/montecarlo/run", r#"{"target": "AlphaBot", "runs": 300}"#);
                batch_done.store(true, Ordering::SeqCst);
                res
            })
        };
        thread::sleep(std::time::Duration::from_millis(50));

        let res = send(addr, "GET", "/simulation/state", "");
        assert!(!batch_done.load(Ordering::SeqCst));
        assert_eq!(res.0, 200);
        assert_eq!(value(&res)["status"], "idle");

        let res = batch.join().unwrap();
        assert_eq!(res.0, 200);
        assert_eq!(value(&res)["runs"], 300);

        for _ in 0..2 {
            server.unblock();
        }
        serving.join().unwrap().unwrap();
        control.shutdown();
        worker.join().unwrap().unwrap();
    }
}
