//! autoheal - self-healing pipeline orchestrator
//!
//! Runs pipelines of shell commands phase by phase. When a command fails,
//! the failure is classified, a recovery strategy is selected and applied
//! (retry with backoff, parameter adaptation, alternative command,
//! escalation to a human) and everything is summarised in a run report.
//!
//! # Architecture
//!
//! - **classifier**: exit status + log content → issue kind and severity
//! - **history**: append-only attempt history, optionally persisted
//! - **strategy**: pure decision function choosing a recovery action
//! - **recovery**: carries out the chosen action
//! - **orchestrator**: phase/operation loop and per-operation state machine

pub mod classifier;
pub mod errors;
pub mod escalation;
pub mod history;
pub mod orchestrator;
pub mod recovery;
pub mod report;
pub mod runner;
pub mod strategy;
pub mod types;

// Front end
pub mod cli;
pub mod telemetry;

// Re-export commonly used types
pub use errors::{OrchestratorError, Result};
pub use orchestrator::{Orchestrator, Pipeline};
pub use report::RunReport;
