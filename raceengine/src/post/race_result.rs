use crate::core::engine::SimStatus;
use crate::core::event_log::Event;
use crate::core::strategy::StrategyKind;
use crate::interfaces::snapshot::SimulationSnapshot;
use helpers::general::{argsort, SortOrder};
use serde::Serialize;
use std::fmt::Write;
use std::io::Write as IoWrite;
use std::path::Path;

/// AgentResult is the final record of one agent.
/// * `position` - Classified position, finishers first in finishing order
/// * `lap_times` - (s) Times of all completed laps
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AgentResult {
    pub id: u32,
    pub name: String,
    pub strategy: StrategyKind,
    pub position: u32,
    pub finished: bool,
    pub finish_time: Option<f64>,
    pub laps: u32,
    pub lap_times: Vec<f64>,
    pub best_lap_time: Option<f64>,
    pub pit_stops: u32,
    pub cumulative_tire_wear: f64,
    pub frozen: bool,
}

impl AgentResult {
    /// race_times returns the race time at the end of every completed lap.
    pub fn race_times(&self) -> Vec<f64> {
        self.lap_times
            .iter()
            .scan(0.0, |t, lap_time| {
                *t += lap_time;
                Some(*t)
            })
            .collect()
    }
}

/// RaceResult contains all race information that is required for post-processing the results.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RaceResult {
    pub track: String,
    pub tot_no_laps: u32,
    pub race_time: f64,
    pub status: SimStatus,
    pub classification: Vec<AgentResult>,
    pub events: Vec<Event>,
}

impl RaceResult {
    pub fn from_snapshot(snapshot: &SimulationSnapshot) -> RaceResult {
        RaceResult {
            track: snapshot.track.to_owned().unwrap_or_default(),
            tot_no_laps: snapshot.total_laps,
            race_time: snapshot.race_time,
            status: snapshot.status,
            classification: snapshot
                .agents
                .iter()
                .map(|ranked| AgentResult {
                    id: ranked.agent.id,
                    name: ranked.agent.name.to_owned(),
                    strategy: ranked.agent.strategy,
                    position: ranked.rank,
                    finished: ranked.agent.finish_time.is_some(),
                    finish_time: ranked.agent.finish_time,
                    laps: ranked.agent.lap,
                    lap_times: ranked.agent.lap_times.to_owned(),
                    best_lap_time: ranked.agent.best_lap_time,
                    pit_stops: ranked.agent.pit_stops,
                    cumulative_tire_wear: ranked.agent.cumulative_tire_wear,
                    frozen: ranked.agent.frozen,
                })
                .collect(),
            events: snapshot.events.to_owned(),
        }
    }

    pub fn winner(&self) -> Option<&AgentResult> {
        self.classification.first().filter(|agent| agent.finished)
    }

    pub fn agent_by_name(&self, name: &str) -> Option<&AgentResult> {
        self.classification.iter().find(|agent| agent.name == name)
    }

    pub fn finish_time_of(&self, name: &str) -> Option<f64> {
        self.agent_by_name(name).and_then(|agent| agent.finish_time)
    }

    /// leaderboard_by_best_lap orders the agents by their fastest lap, agents without a
    /// completed lap last.
    pub fn leaderboard_by_best_lap(&self) -> Vec<&AgentResult> {
        let best_laps: Vec<f64> = self
            .classification
            .iter()
            .map(|agent| agent.best_lap_time.unwrap_or(f64::INFINITY))
            .collect();

        argsort(&best_laps, SortOrder::Ascending)
            .into_iter()
            .map(|idx| &self.classification[idx])
            .collect()
    }

    fn format_lap_and_race_times(&self) -> Result<String, std::fmt::Error> {
        let mut tmp_string_agent_info = String::from("lap, ");
        for (i, agent) in self.classification.iter().enumerate() {
            let sep = if i + 1 < self.classification.len() { ", " } else { "" };
            write!(&mut tmp_string_agent_info, "{:>9}{}", agent.name, sep)?;
        }

        let race_times: Vec<Vec<f64>> = self
            .classification
            .iter()
            .map(|agent| agent.race_times())
            .collect();

        let mut tmp_string_laptime = String::new();
        let mut tmp_string_racetime = String::new();

        for lap in 0..self.tot_no_laps as usize {
            write!(&mut tmp_string_laptime, "{:3}, ", lap + 1)?;
            write!(&mut tmp_string_racetime, "{:3}, ", lap + 1)?;

            for (i, agent) in self.classification.iter().enumerate() {
                let sep = if i + 1 < self.classification.len() { ", " } else { "" };
                match agent.lap_times.get(lap) {
                    Some(lap_time) => {
                        write!(&mut tmp_string_laptime, "{:8.3}s{}", lap_time, sep)?;
                        write!(
                            &mut tmp_string_racetime,
                            "{:8.3}s{}",
                            race_times[i][lap], sep
                        )?;
                    }
                    None => {
                        write!(&mut tmp_string_laptime, "{:>9}{}", "-", sep)?;
                        write!(&mut tmp_string_racetime, "{:>9}{}", "-", sep)?;
                    }
                }
            }
            writeln!(&mut tmp_string_laptime)?;
            writeln!(&mut tmp_string_racetime)?;
        }

        let mut content = String::new();
        writeln!(&mut content, "RESULT: Lap times")?;
        writeln!(&mut content, "{}", tmp_string_agent_info)?;
        writeln!(&mut content, "{}", tmp_string_laptime)?;
        writeln!(&mut content, "RESULT: Race times")?;
        writeln!(&mut content, "{}", tmp_string_agent_info)?;
        writeln!(&mut content, "{}", tmp_string_racetime)?;
        writeln!(&mut content, "RESULT: Classification")?;
        for agent in self.classification.iter() {
            match agent.finish_time {
                Some(t) => writeln!(
                    &mut content,
                    "P{} {} ({}) {:.3}s, {} pit stop(s)",
                    agent.position, agent.name, agent.strategy, t, agent.pit_stops
                )?,
                None => writeln!(
                    &mut content,
                    "P{} {} ({}) not classified after {} laps",
                    agent.position, agent.name, agent.strategy, agent.laps
                )?,
            }
        }

        Ok(content)
    }

    /// print_lap_and_race_times prints the resulting lap and race times to the console output.
    pub fn print_lap_and_race_times(&self) {
        match self.format_lap_and_race_times() {
            Ok(content) => print!("{}", content),
            Err(e) => log::error!("Could not format the race result: {}", e),
        }
    }

    /// write_lap_and_race_times_to_file writes the lap and race times to a text file and returns
    /// the path written to.
    pub fn write_lap_and_race_times_to_file(&self, path: &Path) -> anyhow::Result<String> {
        let content = self.format_lap_and_race_times()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;

        Ok(path.to_string_lossy().into_owned())
    }
}
