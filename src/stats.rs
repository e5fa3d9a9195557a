//! Queue-wait distribution statistics
//!
//! Extended view behind `--stats-extended`: the distribution of per-task
//! queue waits (Trueno SIMD reductions plus interpolated percentiles) and a
//! breakdown by task priority.

use serde::Serialize;
use std::collections::HashMap;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Wait-time totals for one priority level
#[derive(Debug, Clone, Default)]
pub struct PriorityStats {
    pub count: u64,
    pub total_wait_ns: u128,
}

/// Extended statistics over queue-wait times, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedStats {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Per-priority summary line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityBreakdown {
    pub priority: String,
    pub count: u64,
    pub avg_wait_time_ms: f64,
}

/// Collects individual queue waits for distribution analysis
#[derive(Debug, Default)]
pub struct WaitTimeTracker {
    /// Individual waits exactly as reported, in nanoseconds
    samples_ns: Vec<u64>,
    total_wait_ns: u128,
    by_priority: HashMap<String, PriorityStats>,
}

impl WaitTimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one task's queue wait
    pub fn record(&mut self, priority: Option<&str>, wait_ns: u64) {
        self.samples_ns.push(wait_ns);
        self.total_wait_ns += u128::from(wait_ns);
        if let Some(priority) = priority {
            let entry = self
                .by_priority
                .entry(priority.trim().to_ascii_uppercase())
                .or_default();
            entry.count += 1;
            entry.total_wait_ns += u128::from(wait_ns);
        }
    }

    pub fn len(&self) -> usize {
        self.samples_ns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples_ns.is_empty()
    }

    /// Distribution of the recorded waits; `None` with no samples.
    ///
    /// Order statistics are taken on the integer nanosecond samples and only
    /// converted to milliseconds at the end. The spread goes through Trueno.
    pub fn extended_stats(&self) -> Option<ExtendedStats> {
        let mut sorted = self.samples_ns.clone();
        sorted.sort_unstable();
        let (&first, &last) = (sorted.first()?, sorted.last()?);

        let mean_ns = self.total_wait_ns as f64 / sorted.len() as f64;
        let pct = |rank: f64| percentile_ns(&sorted, rank) / NANOS_PER_MILLI;

        Some(ExtendedStats {
            mean: mean_ns / NANOS_PER_MILLI,
            stddev: self.stddev_ms(mean_ns),
            min: first as f64 / NANOS_PER_MILLI,
            max: last as f64 / NANOS_PER_MILLI,
            median: pct(50.0),
            p75: pct(75.0),
            p90: pct(90.0),
            p95: pct(95.0),
            p99: pct(99.0),
        })
    }

    /// Standard deviation in milliseconds. Samples are centred on the exact
    /// mean before narrowing to `f32`, so large offsets keep their precision.
    fn stddev_ms(&self, mean_ns: f64) -> f64 {
        let centred: Vec<f32> = self
            .samples_ns
            .iter()
            .map(|&ns| ((ns as f64 - mean_ns) / NANOS_PER_MILLI) as f32)
            .collect();
        trueno::Vector::from_slice(&centred)
            .stddev()
            .map_or(0.0, f64::from)
    }

    /// Per-priority counts and mean waits, HIGH > MEDIUM > LOW first, then
    /// any other label alphabetically
    pub fn priority_breakdown(&self) -> Vec<PriorityBreakdown> {
        let mut sorted: Vec<_> = self.by_priority.iter().collect();
        sorted.sort_by(|a, b| (priority_rank(a.0), a.0).cmp(&(priority_rank(b.0), b.0)));

        sorted
            .into_iter()
            .map(|(name, stats)| PriorityBreakdown {
                priority: name.clone(),
                count: stats.count,
                avg_wait_time_ms: if stats.count > 0 {
                    stats.total_wait_ns as f64 / stats.count as f64 / NANOS_PER_MILLI
                } else {
                    0.0
                },
            })
            .collect()
    }
}

/// Linearly interpolated percentile (`rank` in 0..=100) of sorted samples
fn percentile_ns(sorted: &[u64], rank: f64) -> f64 {
    let Some(&last) = sorted.last() else {
        return 0.0;
    };
    let position = rank / 100.0 * (sorted.len() - 1) as f64;
    let below = position.floor() as usize;
    let Some(&above) = sorted.get(below + 1) else {
        return last as f64;
    };
    let low = sorted[below] as f64;
    low + (above as f64 - low) * (position - below as f64)
}

fn priority_rank(name: &str) -> u8 {
    match name {
        "HIGH" => 0,
        "MEDIUM" => 1,
        "LOW" => 2,
        _ => 3,
    }
}
