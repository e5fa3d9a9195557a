//! Metrics analyzer
//!
//! Reduces the simulation's telemetry to the two headline indicators:
//! mean queue-wait time and task throughput. One linear pass over the rows in
//! stream order; nothing is kept between runs.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HarnessError, Result};
use crate::stats::{ExtendedStats, PriorityBreakdown, WaitTimeTracker};
use crate::telemetry::{TelemetryRow, TelemetryTable};

const NANOS_PER_MILLI: f64 = 1_000_000.0;
const MILLIS_PER_SEC: f64 = 1_000.0;

/// How the run-level `TotalSimTimeMs` is reconciled across rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimTimePolicy {
    /// Later rows overwrite earlier ones; consistency is assumed
    #[default]
    LastSeen,
    /// Every row must carry the same value
    Strict,
}

/// Analyzer switches
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerOptions {
    pub sim_time_policy: SimTimePolicy,
    /// Compute the wait-time distribution and priority breakdown
    pub extended: bool,
}

/// Headline indicators for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResult {
    /// Rows processed
    pub count: u64,
    pub total_sim_time_ms: u64,
    pub total_wait_time_ns: u128,
    pub avg_wait_time_ms: f64,
    pub throughput_tasks_per_sec: f64,
}

/// Summary plus the optional extended sections
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub summary: SummaryResult,
    /// Task count the simulation reports it was asked to run, if it says
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_tasks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_time_distribution: Option<ExtendedStats>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub priorities: Vec<PriorityBreakdown>,
}

/// Outcome of analyzing one run's output
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// The run failed or printed nothing at all; nothing to report
    Skipped,
    /// The run produced no telemetry rows
    NoData,
    Summary(Box<AnalysisReport>),
}

/// Running totals over telemetry rows
#[derive(Debug)]
pub struct MetricsAccumulator {
    policy: SimTimePolicy,
    count: u64,
    total_wait_ns: u128,
    total_sim_time_ms: Option<u64>,
    expected_tasks: Option<u64>,
    tracker: Option<WaitTimeTracker>,
}

impl MetricsAccumulator {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self {
            policy: options.sim_time_policy,
            count: 0,
            total_wait_ns: 0,
            total_sim_time_ms: None,
            expected_tasks: None,
            tracker: options.extended.then(WaitTimeTracker::new),
        }
    }

    /// Fold one row into the totals
    pub fn record(&mut self, row: &TelemetryRow) -> Result<()> {
        self.count += 1;

        if let (SimTimePolicy::Strict, Some(expected)) = (self.policy, self.total_sim_time_ms) {
            if expected != row.total_sim_time_ms {
                return Err(HarnessError::InconsistentSimTime {
                    row: self.count as usize,
                    expected,
                    found: row.total_sim_time_ms,
                });
            }
        }
        self.total_sim_time_ms = Some(row.total_sim_time_ms);
        self.total_wait_ns += u128::from(row.queue_wait_ns);

        if row.total_tasks.is_some() {
            self.expected_tasks = row.total_tasks;
        }
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.record(row.priority.as_deref(), row.queue_wait_ns);
        }
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Derive the indicators; `None` if no row was recorded
    pub fn finish(self) -> Option<AnalysisReport> {
        if self.count == 0 {
            return None;
        }

        let total_sim_time_ms = self.total_sim_time_ms.unwrap_or(0);
        let avg_wait_time_ns = self.total_wait_ns as f64 / self.count as f64;
        let throughput_tasks_per_sec = if total_sim_time_ms > 0 {
            self.count as f64 / (total_sim_time_ms as f64 / MILLIS_PER_SEC)
        } else {
            0.0
        };

        if let Some(expected) = self.expected_tasks {
            if expected != self.count {
                warn!(
                    expected,
                    processed = self.count,
                    "simulation reported a different task count than it emitted rows"
                );
            }
        }

        let (wait_time_distribution, priorities) = match &self.tracker {
            Some(tracker) => (tracker.extended_stats(), tracker.priority_breakdown()),
            None => (None, Vec::new()),
        };

        Some(AnalysisReport {
            summary: SummaryResult {
                count: self.count,
                total_sim_time_ms,
                total_wait_time_ns: self.total_wait_ns,
                avg_wait_time_ms: avg_wait_time_ns / NANOS_PER_MILLI,
                throughput_tasks_per_sec,
            },
            expected_tasks: self.expected_tasks,
            wait_time_distribution,
            priorities,
        })
    }
}

/// Analyze captured simulation output.
///
/// `None` (the run failed and was already reported) and empty text both
/// yield [`Analysis::Skipped`]. Text without any record yields
/// [`Analysis::NoData`].
/// Missing columns, short rows and non-integer numeric fields are errors.
pub fn analyze(text: Option<&str>, options: AnalyzerOptions) -> Result<Analysis> {
    let Some(text) = text else {
        debug!("no simulation output, skipping analysis");
        return Ok(Analysis::Skipped);
    };
    if text.is_empty() {
        debug!("simulation printed nothing, skipping analysis");
        return Ok(Analysis::Skipped);
    }

    let table = TelemetryTable::parse(text)?;
    if table.is_empty() {
        return Ok(Analysis::NoData);
    }

    let mut acc = MetricsAccumulator::new(options);
    for row in table.rows()? {
        acc.record(&row?)?;
    }
    debug!(rows = acc.count(), "telemetry analyzed");

    Ok(acc
        .finish()
        .map_or(Analysis::NoData, |report| Analysis::Summary(Box::new(report))))
}
