//! Operation definitions
//!
//! An operation is one named command bound to a pipeline phase. Operations
//! are immutable for the duration of a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Stable identifier of an operation within a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

/// A unit of work: a shell command bound to a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique identifier (e.g. "OB01")
    pub id: OperationId,

    /// Owning phase name, filled in when the pipeline is loaded
    #[serde(default)]
    pub phase: String,

    /// Command line, may contain `{param}` placeholders
    pub command: String,

    /// Directory the command runs in
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Per-operation timeout ceiling in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Unclassifiable failures of this operation are critical
    #[serde(default)]
    pub critical_path: bool,

    /// Failures that would escalate are waived instead
    #[serde(default)]
    pub optional: bool,

    /// Substitute run in place of this operation when its path is blocked
    #[serde(default)]
    pub alternative: Option<Box<Operation>>,
}

impl Operation {
    /// Create a new operation in the given phase
    pub fn new(id: impl Into<String>, phase: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: OperationId::new(id),
            phase: phase.into(),
            command: command.into(),
            working_dir: default_working_dir(),
            timeout_secs: None,
            critical_path: false,
            optional: false,
            alternative: None,
        }
    }

    /// Set working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Set timeout ceiling
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Mark as critical path
    pub fn critical(mut self) -> Self {
        self.critical_path = true;
        self
    }

    /// Mark as optional (non-fatal)
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Register a substitute operation
    pub fn with_alternative(mut self, alternative: Operation) -> Self {
        self.alternative = Some(Box::new(alternative));
        self
    }

    /// Timeout ceiling as a duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Short label used in logs and escalation bundles
    pub fn label(&self) -> String {
        format!("{} [{}]", self.id, self.phase)
    }
}
