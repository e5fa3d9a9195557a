//! CLI argument parsing for simharness
//!
//! Every flag is optional: a bare `simharness` runs 50 tasks on 3 workers
//! against the default classpath and prints the text report.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::analyzer::SimTimePolicy;
use crate::config::HarnessConfig;

/// Output format for the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    #[default]
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "simharness")]
#[command(version)]
#[command(about = "Run the task-scheduling simulation and summarize its telemetry", long_about = None)]
pub struct Cli {
    /// Number of tasks to submit (default: 50)
    #[arg(short = 't', long = "tasks", value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub tasks: Option<u32>,

    /// Number of scheduler worker threads (default: 3)
    #[arg(short = 'w', long = "workers", value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: Option<u32>,

    /// Runtime used to launch the simulation (default: java)
    #[arg(long = "runtime", value_name = "PROGRAM")]
    pub runtime: Option<String>,

    /// Resolution path for the simulation's compiled artifacts (default: src/main/java)
    #[arg(long = "classpath", value_name = "PATH")]
    pub classpath: Option<String>,

    /// Simulation entry point (default: com.scheduler.Simulation)
    #[arg(long = "entry-point", value_name = "NAME")]
    pub entry_point: Option<String>,

    /// Kill the simulation if it runs longer than this many seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Load settings from a TOML file (flags take precedence)
    #[arg(short = 'C', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Show queue-wait distribution and per-priority breakdown
    #[arg(long = "stats-extended")]
    pub stats_extended: bool,

    /// Fail if TotalSimTimeMs differs between rows instead of taking the last value
    #[arg(long = "strict-sim-time")]
    pub strict_sim_time: bool,

    /// Enable debug logging to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Overlay command-line values onto a base configuration
    pub fn apply(&self, mut config: HarnessConfig) -> HarnessConfig {
        if let Some(tasks) = self.tasks {
            config.task_count = tasks;
        }
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(runtime) = &self.runtime {
            config.simulation.runtime = runtime.clone();
        }
        if let Some(classpath) = &self.classpath {
            config.simulation.classpath = classpath.clone();
        }
        if let Some(entry_point) = &self.entry_point {
            config.simulation.entry_point = entry_point.clone();
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        if self.strict_sim_time {
            config.sim_time_policy = SimTimePolicy::Strict;
        }
        config
    }
}
