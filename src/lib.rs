//! simharness - measurement harness for a task-scheduling simulation
//!
//! Launches the simulation as a subordinate process, captures its per-task
//! CSV telemetry, and reduces it to mean queue-wait time and throughput.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod stats;
pub mod telemetry;
