//! Error types for the harness
//!
//! Runner failures are reported to the operator and turned into an absent
//! result; telemetry and configuration failures propagate to `main`.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while running the simulation or analyzing its output
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The runtime could not be spawned (not on PATH, not executable)
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or reading from the subordinate process failed
    #[error("I/O error while running simulation: {0}")]
    Io(#[from] std::io::Error),

    /// The subordinate exited unsuccessfully
    #[error("simulation exited with {status}")]
    NonZeroExit { status: ExitStatus, stderr: String },

    /// The subordinate ran past its deadline and was terminated
    #[error("simulation timed out after {after:?}")]
    Timeout { after: Duration },

    /// The run was cancelled and the subordinate was terminated
    #[error("simulation cancelled")]
    Cancelled,

    /// Standard output was not valid UTF-8
    #[error("simulation output is not valid UTF-8")]
    InvalidOutput,

    /// The telemetry text is not well-formed CSV
    #[error("malformed CSV at line {line}: {reason}")]
    MalformedCsv { line: usize, reason: String },

    /// The header does not name a required column
    #[error("telemetry header is missing required column '{column}'")]
    MissingColumn { column: String },

    /// A record is shorter than the header
    #[error("row {row} has no value for column '{column}'")]
    MissingField { row: usize, column: String },

    /// A numeric column holds something other than a non-negative integer
    #[error("row {row}: column '{column}' is not a non-negative integer: '{value}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    /// `TotalSimTimeMs` differs between rows (strict policy only)
    #[error("row {row}: TotalSimTimeMs is {found}, expected {expected} (must be constant per run)")]
    InconsistentSimTime { row: usize, expected: u64, found: u64 },

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read
    #[error("failed to read config file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for `HarnessConfig`
    #[error("TOML parse error in '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, HarnessError>;
