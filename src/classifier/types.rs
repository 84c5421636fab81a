//! Issue type definitions

use crate::errors::OrchestratorError;
use crate::types::{ExitStatus, Operation, OperationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Timeout,
    ResourceExhaustion,
    Network,
    Permission,
    Configuration,
    Unknown,
}

impl IssueKind {
    /// Severity a kind carries unless policy overrides it
    pub fn default_severity(&self) -> Severity {
        match self {
            IssueKind::Timeout => Severity::Medium,
            IssueKind::ResourceExhaustion => Severity::High,
            IssueKind::Network => Severity::Medium,
            IssueKind::Permission => Severity::Medium,
            IssueKind::Configuration => Severity::Medium,
            IssueKind::Unknown => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Timeout => "timeout",
            IssueKind::ResourceExhaustion => "resource_exhaustion",
            IssueKind::Network => "network",
            IssueKind::Permission => "permission",
            IssueKind::Configuration => "configuration",
            IssueKind::Unknown => "unknown",
        }
    }

    /// Suggested manual remediation, used in escalation bundles
    pub fn remediation(&self) -> &'static str {
        match self {
            IssueKind::Timeout => {
                "Raise the operation timeout or investigate what is slowing the command down"
            }
            IssueKind::ResourceExhaustion => {
                "Grant the operation more memory or reduce its input size"
            }
            IssueKind::Network => {
                "Check connectivity and availability of the remote endpoints the command uses"
            }
            IssueKind::Permission => {
                "Verify file permissions and credentials of the account running the pipeline"
            }
            IssueKind::Configuration => {
                "Check for missing files, parameters or environment variables the command expects"
            }
            IssueKind::Unknown => "Inspect the captured log of the failing attempt",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered severity: low < medium < high < critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(OrchestratorError::ConfigError(format!("Unknown severity: {}", other))),
        }
    }
}

/// What the classifier knows about the operation besides the result
#[derive(Debug, Clone)]
pub struct OperationContext<'a> {
    pub operation: &'a Operation,

    /// Command line as actually executed (placeholders rendered)
    pub command: &'a str,

    /// Kinds of earlier issues of this operation in this run
    pub prior_issues: Vec<IssueKind>,
}

/// Structured context carried by an issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueContext {
    pub command: String,
    pub attempt: u32,
    pub exit_status: ExitStatus,
    pub prior_issues: Vec<IssueKind>,

    /// Log line that triggered a pattern match
    pub evidence: Option<String>,
}

/// Classified failure of one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub operation: OperationId,
    pub phase: String,
    pub message: String,
    pub context: IssueContext,

    /// Log could not be read; classification used exit status only
    pub log_unavailable: bool,

    pub detected_at: DateTime<Utc>,
}

impl Issue {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn test_default_severity() {
        assert_eq!(IssueKind::Timeout.default_severity(), Severity::Medium);
        assert_eq!(IssueKind::ResourceExhaustion.default_severity(), Severity::High);
        assert_eq!(IssueKind::Unknown.default_severity(), Severity::Low);
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&IssueKind::ResourceExhaustion).unwrap();
        assert_eq!(json, "\"resource_exhaustion\"");
        assert_eq!(IssueKind::ResourceExhaustion.to_string(), "resource_exhaustion");
    }
}
