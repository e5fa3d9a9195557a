//! Report rendering (text and JSON)

use serde::Serialize;

use crate::analyzer::{Analysis, AnalysisReport};
use crate::cli::OutputFormat;

/// Operator-facing message when the simulation emitted no rows
pub const NO_DATA_MESSAGE: &str = "No data returned.";

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum JsonOutcome<'a> {
    NoData,
    Ok(&'a AnalysisReport),
}

/// Render the outcome in the requested format; `None` when there is nothing
/// to print (the run failed and was already reported)
pub fn render(analysis: &Analysis, format: OutputFormat) -> serde_json::Result<Option<String>> {
    match format {
        OutputFormat::Text => Ok(render_text(analysis)),
        OutputFormat::Json => render_json(analysis),
    }
}

pub fn render_text(analysis: &Analysis) -> Option<String> {
    match analysis {
        Analysis::Skipped => None,
        Analysis::NoData => Some(format!("{}\n", NO_DATA_MESSAGE)),
        Analysis::Summary(report) => Some(format_report(report)),
    }
}

pub fn render_json(analysis: &Analysis) -> serde_json::Result<Option<String>> {
    let outcome = match analysis {
        Analysis::Skipped => return Ok(None),
        Analysis::NoData => JsonOutcome::NoData,
        Analysis::Summary(report) => JsonOutcome::Ok(report),
    };
    serde_json::to_string_pretty(&outcome).map(|json| Some(json + "\n"))
}

fn format_report(report: &AnalysisReport) -> String {
    let s = &report.summary;
    let mut out = String::new();

    out.push_str("\nResults:\n");
    out.push_str(&format!("Total Tasks Processed: {}\n", s.count));
    out.push_str(&format!(
        "Total Simulation Time: {} ms\n",
        s.total_sim_time_ms
    ));
    out.push_str(&format!(
        "Average Queue Wait Time: {:.4} ms\n",
        s.avg_wait_time_ms
    ));
    out.push_str(&format!(
        "Throughput: {:.2} tasks/sec\n",
        s.throughput_tasks_per_sec
    ));

    if let Some(dist) = &report.wait_time_distribution {
        out.push_str("\n=== Queue Wait Distribution (SIMD-accelerated via Trueno) ===\n");
        out.push_str(&format!("  Mean:         {:.4} ms\n", dist.mean));
        out.push_str(&format!("  Std Dev:      {:.4} ms\n", dist.stddev));
        out.push_str(&format!("  Min:          {:.4} ms\n", dist.min));
        out.push_str(&format!("  Max:          {:.4} ms\n", dist.max));
        out.push_str(&format!("  Median (P50): {:.4} ms\n", dist.median));
        out.push_str(&format!("  P75:          {:.4} ms\n", dist.p75));
        out.push_str(&format!("  P90:          {:.4} ms\n", dist.p90));
        out.push_str(&format!("  P95:          {:.4} ms\n", dist.p95));
        out.push_str(&format!("  P99:          {:.4} ms\n", dist.p99));
    }

    if !report.priorities.is_empty() {
        out.push_str("\n=== Priority Breakdown ===\n");
        for p in &report.priorities {
            out.push_str(&format!(
                "  {:<8} {:>6} tasks  avg wait {:.4} ms\n",
                p.priority, p.count, p.avg_wait_time_ms
            ));
        }
    }

    out
}
