use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Number of events kept by default.
pub const DEFAULT_EVENT_RETENTION: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{}", name)
    }
}

/// * `timestamp` - (s) Race time at which the event happened
/// * `tick` - Tick during which the event happened
/// * `lap` - Lap of the concerned agent, or of the leader for global events
/// * `agent` - Concerned agent, `None` for global events such as weather changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: f64,
    pub tick: u64,
    pub lap: u32,
    pub severity: Severity,
    pub agent: Option<u32>,
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[t={:.1}s] lap {} {}: {}",
            self.timestamp, self.lap, self.severity, self.message
        )
    }
}

/// EventLog is an append-only log that keeps the newest `retention` events.
#[derive(Debug, Clone)]
pub struct EventLog {
    retention: usize,
    events: VecDeque<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        EventLog::new(DEFAULT_EVENT_RETENTION)
    }
}

impl EventLog {
    pub fn new(retention: usize) -> EventLog {
        EventLog {
            retention,
            events: VecDeque::with_capacity(retention),
        }
    }

    pub fn push(&mut self, event: Event) {
        match event.severity {
            Severity::Info => log::info!("{}", event),
            Severity::Warning => log::warn!("{}", event),
            Severity::Critical => log::error!("{}", event),
        }

        self.events.push_back(event);
        while self.events.len() > self.retention {
            self.events.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in insertion order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn to_vec(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(tick: u64) -> Event {
        Event {
            timestamp: tick as f64 * 0.2,
            tick,
            lap: 1,
            severity: Severity::Info,
            agent: None,
            message: format!("event {}", tick),
        }
    }

    #[test]
    fn keeps_only_the_newest_events() {
        let mut log = EventLog::new(3);
        for tick in 0..5 {
            log.push(event(tick));
        }
        assert_eq!(log.len(), 3);
        let ticks: Vec<u64> = log.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![2, 3, 4]);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn formats_like_the_dashboard_log() {
        let mut e = event(62);
        e.lap = 3;
        e.severity = Severity::Warning;
        e.message = "BetaBot engine temperature high (95.0°C)".to_owned();
        assert_eq!(
            e.to_string(),
            "[t=12.4s] lap 3 WARNING: BetaBot engine temperature high (95.0°C)"
        );
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    }
}
