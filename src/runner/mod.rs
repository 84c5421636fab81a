//! Command execution collaborators
//!
//! The orchestrator treats running a command and reading its captured
//! output as opaque capabilities. `ShellCommandRunner` and `FileLogStore`
//! are the production implementations.

pub mod logs;
pub mod process;

pub use logs::{FileLogStore, InMemoryLogStore, LogStore};
pub use process::ShellCommandRunner;

use crate::errors::Result;
use crate::types::{ExecutionResult, OperationId};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Everything a runner needs to execute one attempt
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub operation: OperationId,
    pub phase: String,
    pub attempt: u32,

    /// Command line with placeholders rendered
    pub command: String,

    pub working_dir: PathBuf,

    /// Extra environment (effective parameters)
    pub env: Vec<(String, String)>,

    /// Timeout ceiling; the runner kills the command when it is reached
    pub timeout: Duration,
}

/// Executes a command and captures its combined output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, request: &RunRequest) -> Result<ExecutionResult>;
}
