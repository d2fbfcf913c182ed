use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::metrics::{TICKS_PER_MS, names};
use crate::protocol::{AgentStatus, MetricsReport};

/// Silence after which an agent is reported as lost.
pub const STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Live(AgentStatus),
    Lost,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Live(status) => write!(f, "{}", status),
            AgentState::Lost => f.write_str("lost"),
        }
    }
}

/// What the board knows about one agent.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub status: AgentStatus,
    pub last_seen: Instant,
    /// Class of the latest metrics report.
    pub class: Option<String>,
    pub metrics: HashMap<String, f64>,
    pub finished: bool,
    /// `time` attribute of the latest metrics report.
    pub reported_at: Option<String>,
}

impl AgentRecord {
    fn new(status: AgentStatus, now: Instant) -> Self {
        Self {
            status,
            last_seen: now,
            class: None,
            metrics: HashMap::new(),
            finished: false,
            reported_at: None,
        }
    }

    fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied().filter(|value| !value.is_nan())
    }
}

/// Agents keyed by source address, in address order.
#[derive(Debug, Clone)]
pub struct AgentBoard {
    agents: BTreeMap<Ipv4Addr, AgentRecord>,
    stale_after: Duration,
}

impl Default for AgentBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBoard {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_stale_after(STALE_AFTER)
    }

    #[must_use]
    pub const fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            agents: BTreeMap::new(),
            stale_after,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    #[must_use]
    pub fn get(&self, agent: Ipv4Addr) -> Option<&AgentRecord> {
        self.agents.get(&agent)
    }

    pub fn agents(&self) -> impl Iterator<Item = (Ipv4Addr, &AgentRecord)> {
        self.agents.iter().map(|(ip, record)| (*ip, record))
    }

    /// Returns the previous status when the agent was already known.
    pub fn observe_heartbeat_at(
        &mut self,
        agent: Ipv4Addr,
        status: AgentStatus,
        now: Instant,
    ) -> Option<AgentStatus> {
        match self.agents.get_mut(&agent) {
            Some(record) => {
                let previous = record.status;
                record.status = status;
                record.last_seen = now;
                Some(previous)
            }
            None => {
                self.agents.insert(agent, AgentRecord::new(status, now));
                None
            }
        }
    }

    pub fn observe_heartbeat(&mut self, agent: Ipv4Addr, status: AgentStatus) -> Option<AgentStatus> {
        self.observe_heartbeat_at(agent, status, Instant::now())
    }

    /// Merges `report` into the agent's record. Returns `false` for an agent
    /// that has not sent a heartbeat yet; its report is dropped.
    pub fn observe_metrics_at(
        &mut self,
        agent: Ipv4Addr,
        report: &MetricsReport,
        now: Instant,
    ) -> bool {
        let Some(record) = self.agents.get_mut(&agent) else {
            return false;
        };
        record.last_seen = now;
        record.class = Some(report.class.clone());
        record.finished = report.finished;
        record.reported_at = Some(report.time.clone());
        for (name, value) in &report.metrics {
            record.metrics.insert(name.clone(), *value);
        }
        true
    }

    pub fn observe_metrics(&mut self, agent: Ipv4Addr, report: &MetricsReport) -> bool {
        self.observe_metrics_at(agent, report, Instant::now())
    }

    #[must_use]
    pub fn state_at(&self, agent: Ipv4Addr, now: Instant) -> Option<AgentState> {
        self.agents.get(&agent).map(|record| self.state_of(record, now))
    }

    fn state_of(&self, record: &AgentRecord, now: Instant) -> AgentState {
        if now.saturating_duration_since(record.last_seen) > self.stale_after {
            AgentState::Lost
        } else {
            AgentState::Live(record.status)
        }
    }

    /// Agents not heard from within the staleness window.
    #[must_use]
    pub fn lost_at(&self, now: Instant) -> Vec<Ipv4Addr> {
        self.agents
            .iter()
            .filter(|(_, record)| self.state_of(record, now) == AgentState::Lost)
            .map(|(ip, _)| *ip)
            .collect()
    }

    /// Sums the latest metrics of every running agent plus `reporter`.
    #[must_use]
    pub fn totals_at(&self, reporter: Ipv4Addr, now: Instant) -> FleetTotals {
        let mut totals = FleetTotals::default();
        for (ip, record) in &self.agents {
            let running = self.state_of(record, now) == AgentState::Live(AgentStatus::Run);
            if running || *ip == reporter {
                totals.add(&|name| record.metric(name));
            }
        }
        totals
    }

    /// One line per agent: address, state, class and last sample time.
    #[must_use]
    pub fn summary_at(&self, now: Instant) -> Vec<String> {
        self.agents
            .iter()
            .map(|(ip, record)| {
                format!(
                    "{} {} {}{} (last report {})",
                    ip,
                    self.state_of(record, now),
                    if record.finished { "<Test Complete> " } else { "" },
                    record.class.as_deref().unwrap_or("-"),
                    record.reported_at.as_deref().unwrap_or("never"),
                )
            })
            .collect()
    }
}

/// Aggregate of the latest samples across a set of agents.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FleetTotals {
    pub agents: usize,
    pub gets: f64,
    pub sets: f64,
    pub get_ticks: f64,
    pub set_ticks: f64,
    pub gets_per_second: f64,
    pub sets_per_second: f64,
    pub average_gets_per_second: f64,
    pub average_sets_per_second: f64,
}

impl FleetTotals {
    /// Totals of a single report, as shown for a local run.
    #[must_use]
    pub fn from_report(report: &MetricsReport) -> Self {
        let mut totals = Self::default();
        totals.add(&|name| report.metric(name).filter(|value| !value.is_nan()));
        totals
    }

    #[expect(clippy::float_arithmetic, reason = "metric sums are floating point")]
    fn add(&mut self, metric: &dyn Fn(&str) -> Option<f64>) {
        let fields = [
            (&mut self.gets, names::GET_ITERATIONS),
            (&mut self.sets, names::SET_ITERATIONS),
            (&mut self.get_ticks, names::GET_TICKS),
            (&mut self.set_ticks, names::SET_TICKS),
            (&mut self.gets_per_second, names::GETS_PER_SECOND),
            (&mut self.sets_per_second, names::SETS_PER_SECOND),
            (&mut self.average_gets_per_second, names::AVERAGE_GETS_PER_SECOND),
            (&mut self.average_sets_per_second, names::AVERAGE_SETS_PER_SECOND),
        ];
        for (total, name) in fields {
            if let Some(value) = metric(name) {
                *total += value;
            }
        }
        self.agents = self.agents.saturating_add(1);
    }

    /// Fleet mean Get latency in milliseconds; NaN before the first Get.
    #[must_use]
    pub const fn get_latency_ms(&self) -> f64 {
        latency_ms(self.get_ticks, self.gets)
    }

    #[must_use]
    pub const fn set_latency_ms(&self) -> f64 {
        latency_ms(self.set_ticks, self.sets)
    }
}

#[expect(clippy::float_arithmetic, reason = "latency is a ratio of sums")]
const fn latency_ms(ticks: f64, iterations: f64) -> f64 {
    if iterations > 0.0 {
        ticks / iterations / TICKS_PER_MS
    } else {
        f64::NAN
    }
}

/// Console line printed for each metrics frame.
#[must_use]
pub fn watch_line(agent: Ipv4Addr, report: &MetricsReport, totals: &FleetTotals) -> String {
    format!(
        "[{}] {} : {}{} => {} Gets @ {:.2} ms => {:.2} tps ({:.2} atps), {} Sets @ {:.2} ms => {:.2} tps ({:.2} atps)",
        report.time,
        agent,
        if report.finished { "<Test Complete> " } else { "" },
        report.class,
        totals.gets,
        totals.get_latency_ms(),
        totals.gets_per_second,
        totals.average_gets_per_second,
        totals.sets,
        totals.set_latency_ms(),
        totals.sets_per_second,
        totals.average_sets_per_second,
    )
}
