//! Harness configuration
//!
//! Every external-dependency location (runtime, classpath, entry point) is a
//! configuration value with a documented default, so the harness can drive a
//! simulation built anywhere. Values come from, in increasing precedence:
//! built-in defaults, an optional TOML file, command-line flags.
//!
//! # Example
//! ```
//! use simharness::config::HarnessConfig;
//!
//! let config = HarnessConfig::default();
//! assert_eq!(config.task_count, 50);
//! assert_eq!(config.worker_count, 3);
//! assert_eq!(config.simulation.classpath, "src/main/java");
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::analyzer::SimTimePolicy;
use crate::error::{HarnessError, Result};
use crate::runner::{ExecutionOptions, SimulationCommand};

/// How to locate and launch the simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Runtime executable, resolved through PATH (default: `java`)
    pub runtime: String,

    /// Flag that introduces the resolution path (default: `-cp`)
    pub classpath_flag: String,

    /// Resolution path for the simulation's pre-built artifacts, relative to
    /// the working directory (default: `src/main/java`)
    pub classpath: String,

    /// Executable unit inside the classpath (default: `com.scheduler.Simulation`)
    pub entry_point: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            runtime: "java".to_string(),
            classpath_flag: "-cp".to_string(),
            classpath: "src/main/java".to_string(),
            entry_point: "com.scheduler.Simulation".to_string(),
        }
    }
}

/// Top-level harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Number of tasks the simulation should submit
    pub task_count: u32,

    /// Number of scheduler worker threads
    pub worker_count: u32,

    /// Deadline for the simulation run in seconds; `None` waits forever
    pub timeout_secs: Option<f64>,

    /// Time between SIGTERM and SIGKILL when terminating the subordinate
    pub grace_period_ms: u64,

    /// How `TotalSimTimeMs` is reconciled across rows
    pub sim_time_policy: SimTimePolicy,

    pub simulation: SimulationConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            task_count: 50,
            worker_count: 3,
            timeout_secs: None,
            grace_period_ms: 500,
            sim_time_policy: SimTimePolicy::LastSeen,
            simulation: SimulationConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Parse a configuration from TOML text; missing keys keep their defaults
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| HarnessError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| HarnessError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.task_count == 0 {
            return Err(HarnessError::InvalidConfig(
                "task_count must be positive".to_string(),
            ));
        }

        if self.worker_count == 0 {
            return Err(HarnessError::InvalidConfig(
                "worker_count must be positive".to_string(),
            ));
        }

        if let Some(secs) = self.timeout_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(HarnessError::InvalidConfig(format!(
                    "timeout_secs must be a positive number of seconds, got {}",
                    secs
                )));
            }
            if Duration::try_from_secs_f64(secs).is_err() {
                return Err(HarnessError::InvalidConfig(format!(
                    "timeout_secs is too large to represent, got {}",
                    secs
                )));
            }
        }

        for (name, value) in [
            ("simulation.runtime", &self.simulation.runtime),
            ("simulation.entry_point", &self.simulation.entry_point),
        ] {
            if value.trim().is_empty() {
                return Err(HarnessError::InvalidConfig(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Build the subordinate command described by this configuration
    pub fn command(&self) -> SimulationCommand {
        SimulationCommand::new(&self.simulation.runtime)
            .classpath(&self.simulation.classpath_flag, &self.simulation.classpath)
            .entry_point(&self.simulation.entry_point)
            .task_count(self.task_count)
            .worker_count(self.worker_count)
    }

    /// Execution limits for the runner
    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            timeout: self
                .timeout_secs
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
            grace_period: Duration::from_millis(self.grace_period_ms),
            ..ExecutionOptions::default()
        }
    }
}
