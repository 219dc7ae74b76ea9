use crate::core::engine::SimulationEngine;
use crate::core::handle_race::run_to_completion;
use crate::core::track::TrackCatalog;
use crate::error::SimError;
use crate::pre::read_sim_pars::SimPars;
use helpers::general::argmin;
use rayon::prelude::*;
use serde::Serialize;

/// z value of the 95 % confidence intervals.
const Z_95: f64 = 1.96;

/// Win probability and finish time statistics of one agent over a batch of races.
/// * `win_prob` - Share of races won
/// * `margin` - 95 % confidence margin of the win probability
/// * `mean_finish_time` - (s) Mean finish time, unfinished races count with the cut-off time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloResult {
    pub agent_name: String,
    pub runs: u32,
    pub win_prob: f64,
    pub margin: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub mean_finish_time: f64,
    pub ci_time_low: f64,
    pub ci_time_high: f64,
}

impl MonteCarloResult {
    pub fn formatted(&self) -> String {
        format!(
            "Monte Carlo estimated win probability for {}: {:.1}% ± {:.1}% ({} runs)\n\
             95% CI for average finish time: [{:.2}, {:.2}] sec",
            self.agent_name,
            self.win_prob * 100.0,
            self.margin * 100.0,
            self.runs,
            self.ci_time_low,
            self.ci_time_high
        )
    }
}

/// Mean and 95 % confidence margin using the population variance.
fn mean_and_margin(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, Z_95 * var.sqrt() / n.sqrt())
}

/// finish_times runs one race and returns the finish time of every agent in id order.
/// Agents that did not finish get the cut-off time.
pub fn finish_times(
    sim_pars: &SimPars,
    catalog: &TrackCatalog,
    seed: u64,
) -> Result<Vec<(String, f64)>, SimError> {
    let mut engine = SimulationEngine::with_catalog(seed, catalog.to_owned());
    let result = run_to_completion(&mut engine, sim_pars.to_owned(), |_, _| {})?;

    let mut times: Vec<(u32, String, f64)> = result
        .classification
        .iter()
        .map(|agent| {
            (
                agent.id,
                agent.name.to_owned(),
                agent.finish_time.unwrap_or(sim_pars.race_pars.max_race_time),
            )
        })
        .collect();
    times.sort_by_key(|(id, _, _)| *id);

    Ok(times.into_iter().map(|(_, name, t)| (name, t)).collect())
}

/// run_monte_carlo simulates `runs` races in parallel, run i with seed `base_seed + i`, and
/// estimates the win probability and finish time of the target agent. Ties on the finish time
/// go to the lower agent id.
pub fn run_monte_carlo(
    sim_pars: &SimPars,
    catalog: &TrackCatalog,
    target: &str,
    runs: u32,
    base_seed: u64,
) -> Result<MonteCarloResult, SimError> {
    if runs == 0 {
        return Err(SimError::config("A Monte Carlo batch needs at least one run!"));
    }
    let target_idx = sim_pars
        .agents
        .iter()
        .position(|agent| agent.name == target)
        .ok_or_else(|| SimError::config(format!("Unknown target agent {}!", target)))?;
    sim_pars.validate()?;

    // list position -> id order as used by finish_times
    let mut ids: Vec<(u32, usize)> = sim_pars
        .agent_ids()
        .into_iter()
        .enumerate()
        .map(|(idx, id)| (id, idx))
        .collect();
    ids.sort();
    let target_pos = ids
        .iter()
        .position(|(_, idx)| *idx == target_idx)
        .ok_or_else(|| SimError::config(format!("Unknown target agent {}!", target)))?;

    log::info!(
        "Running {} Monte Carlo races for {} on {}",
        runs,
        target,
        sim_pars.race_pars.track
    );

    let all_times: Vec<Vec<(String, f64)>> = (0..runs)
        .into_par_iter()
        .map(|i| finish_times(sim_pars, catalog, base_seed.wrapping_add(i as u64)))
        .collect::<Result<Vec<_>, SimError>>()?;

    let mut win_indicators = Vec::with_capacity(all_times.len());
    let mut target_times = Vec::with_capacity(all_times.len());

    for times in all_times.iter() {
        let t: Vec<f64> = times.iter().map(|(_, t)| *t).collect();
        let winner = argmin(&t);
        win_indicators.push(if winner == Some(target_pos) { 1.0 } else { 0.0 });
        target_times.push(t[target_pos]);
    }

    let (win_prob, margin) = mean_and_margin(&win_indicators);
    let (mean_finish_time, margin_time) = mean_and_margin(&target_times);

    let result = MonteCarloResult {
        agent_name: target.to_owned(),
        runs,
        win_prob,
        margin,
        ci_low: (win_prob - margin).max(0.0),
        ci_high: (win_prob + margin).min(1.0),
        mean_finish_time,
        ci_time_low: mean_finish_time - margin_time,
        ci_time_high: mean_finish_time + margin_time,
    };
    log::info!("{}", result.formatted());

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn statistics_use_the_population_variance() {
        let (mean, margin) = mean_and_margin(&[1.0, 0.0, 1.0, 0.0]);
        assert_relative_eq!(mean, 0.5);
        assert_relative_eq!(margin, 1.96 * 0.5 / 2.0);
    }

    #[test]
    fn rejects_bad_batches() {
        let catalog = TrackCatalog::new();
        let pars = SimPars::default();
        assert!(matches!(
            run_monte_carlo(&pars, &catalog, "AlphaBot", 0, 1),
            Err(SimError::Configuration(_))
        ));
        assert!(matches!(
            run_monte_carlo(&pars, &catalog, "Nobody", 4, 1),
            Err(SimError::Configuration(_))
        ));
    }
}
