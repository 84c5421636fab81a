//! Execution result types
//!
//! An `ExecutionResult` is the outcome of running an operation once. It is
//! created by the command runner for every attempt and never mutated.

use crate::types::OperationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How a command terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ExitStatus {
    /// Process exited with a code
    Code(i32),

    /// Process was terminated by a signal
    Signal(i32),

    /// Runner killed the process at its timeout ceiling
    TimedOut,

    /// Run was cancelled before the command finished
    Cancelled,
}

impl ExitStatus {
    /// Exit code reported by `timeout(1)` and used for runner timeouts
    pub const TIMEOUT_CODE: i32 = 124;

    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }

    /// Shell-style code: signals map to 128 + signal number
    pub fn normalized_code(&self) -> i32 {
        match self {
            ExitStatus::Code(code) => *code,
            ExitStatus::Signal(signal) => 128 + signal,
            ExitStatus::TimedOut => Self::TIMEOUT_CODE,
            // SIGINT
            ExitStatus::Cancelled => 130,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "exit code {}", code),
            ExitStatus::Signal(signal) => write!(f, "signal {}", signal),
            ExitStatus::TimedOut => write!(f, "timed out"),
            ExitStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Handle to captured combined output, resolved through a `LogStore`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogRef(String);

impl LogRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single attempt of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Operation that was executed (the substitute's id when substituting)
    pub operation: OperationId,

    /// 1-indexed attempt number within the run
    pub attempt: u32,

    /// Termination status
    pub exit_status: ExitStatus,

    /// Captured stdout+stderr
    pub log: Option<LogRef>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// When the attempt finished
    pub finished_at: DateTime<Utc>,

    /// Runner-side diagnostic (launch failures)
    pub detail: Option<String>,
}

impl ExecutionResult {
    /// Create a result for a completed attempt
    pub fn new(
        operation: OperationId,
        attempt: u32,
        exit_status: ExitStatus,
        log: Option<LogRef>,
        duration: Duration,
    ) -> Self {
        Self {
            operation,
            attempt,
            exit_status,
            log,
            duration_ms: duration.as_millis() as u64,
            finished_at: Utc::now(),
            detail: None,
        }
    }

    /// Create a failed result for an attempt the runner could not launch
    pub fn launch_failure(operation: OperationId, attempt: u32, detail: impl Into<String>) -> Self {
        Self {
            operation,
            attempt,
            exit_status: ExitStatus::Code(-1),
            log: None,
            duration_ms: 0,
            finished_at: Utc::now(),
            detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_status.is_success()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}
