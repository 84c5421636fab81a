//! Priority-ordered issue classifier
//!
//! Rules are evaluated top-down, first match wins:
//! 1. timeout exit codes            → Timeout (medium)
//! 2. resource exhaustion codes     → ResourceExhaustion (high)
//! 3. permission codes              → Permission (medium)
//! 4. network log patterns          → Network (medium)
//! 5. configuration patterns/codes  → Configuration (medium)
//! 6. anything else                 → Unknown (low, critical on a critical path)

use crate::classifier::types::{Issue, IssueContext, IssueKind, OperationContext, Severity};
use crate::runner::LogStore;
use crate::types::{ExecutionResult, ExitStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Longest evidence line kept on an issue
const MAX_EVIDENCE_CHARS: usize = 200;

/// Classification tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub timeout_codes: Vec<i32>,
    pub resource_codes: Vec<i32>,
    pub permission_codes: Vec<i32>,
    pub configuration_codes: Vec<i32>,

    /// Case-insensitive substrings indicating network failures
    pub network_patterns: Vec<String>,

    /// Case-insensitive substrings indicating configuration failures
    pub configuration_patterns: Vec<String>,

    /// Critical-path operations get critical severity for every kind,
    /// not only for unclassifiable failures
    pub force_critical_on_any_kind: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            timeout_codes: vec![ExitStatus::TIMEOUT_CODE],
            // SIGKILL from the OOM killer
            resource_codes: vec![137],
            // not executable, EX_NOPERM
            permission_codes: vec![126, 77],
            configuration_codes: vec![2],
            network_patterns: [
                "connection refused",
                "connection reset",
                "connection timed out",
                "network is unreachable",
                "no route to host",
                "could not resolve host",
                "name or service not known",
                "temporary failure in name resolution",
                "broken pipe",
                "econnrefused",
                "econnreset",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            configuration_patterns: [
                "no such file or directory",
                "file not found",
                "missing required",
                "missing parameter",
                "missing argument",
                "not configured",
                "configuration error",
                "invalid configuration",
                "unbound variable",
                "environment variable not set",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            force_critical_on_any_kind: false,
        }
    }
}

/// Maps failed results to issues
#[derive(Debug, Clone, Default)]
pub struct IssueClassifier {
    config: ClassifierConfig,
}

impl IssueClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a failed result. Returns `None` for successful results:
    /// no issue exists for a success.
    pub fn classify(
        &self,
        result: &ExecutionResult,
        op: &OperationContext<'_>,
        logs: &dyn LogStore,
    ) -> Option<Issue> {
        if result.is_success() {
            return None;
        }

        let code = result.exit_status.normalized_code();
        let label = op.operation.label();

        let content = match &result.log {
            Some(log) => match logs.read(log) {
                Ok(content) => Some(content),
                Err(e) => {
                    warn!(operation = %op.operation.id, error = %e, "log unavailable, classifying by exit status");
                    None
                }
            },
            None => None,
        };
        let log_unavailable = content.is_none();
        let mut evidence = None;

        let (kind, message) = if result.exit_status == ExitStatus::TimedOut
            || self.config.timeout_codes.contains(&code)
        {
            (
                IssueKind::Timeout,
                format!("{} timed out ({})", label, result.exit_status),
            )
        } else if self.config.resource_codes.contains(&code) {
            (
                IssueKind::ResourceExhaustion,
                format!("{} exhausted resources ({})", label, result.exit_status),
            )
        } else if self.config.permission_codes.contains(&code) {
            (
                IssueKind::Permission,
                format!("{} was denied permission ({})", label, result.exit_status),
            )
        } else if let Some(line) = content
            .as_deref()
            .and_then(|text| find_evidence(text, &self.config.network_patterns))
        {
            evidence = Some(line);
            (
                IssueKind::Network,
                format!("{} hit a network error ({})", label, result.exit_status),
            )
        } else if let Some(line) = content
            .as_deref()
            .and_then(|text| find_evidence(text, &self.config.configuration_patterns))
        {
            evidence = Some(line);
            (
                IssueKind::Configuration,
                format!("{} is misconfigured ({})", label, result.exit_status),
            )
        } else if self.config.configuration_codes.contains(&code) {
            (
                IssueKind::Configuration,
                format!("{} reported a usage or configuration error ({})", label, result.exit_status),
            )
        } else {
            let message = match &result.detail {
                Some(detail) => format!("{} failed: {}", label, detail),
                None => format!("{} failed with {}", label, result.exit_status),
            };
            (IssueKind::Unknown, message)
        };

        let severity = if op.operation.critical_path
            && (kind == IssueKind::Unknown || self.config.force_critical_on_any_kind)
        {
            Severity::Critical
        } else {
            kind.default_severity()
        };

        debug!(
            operation = %op.operation.id,
            attempt = result.attempt,
            kind = %kind,
            severity = %severity,
            "classified failure"
        );

        Some(Issue {
            kind,
            severity,
            operation: op.operation.id.clone(),
            phase: op.operation.phase.clone(),
            message,
            context: IssueContext {
                command: op.command.to_string(),
                attempt: result.attempt,
                exit_status: result.exit_status,
                prior_issues: op.prior_issues.clone(),
                evidence,
            },
            log_unavailable,
            detected_at: Utc::now(),
        })
    }
}

/// First log line containing any pattern, compared case-insensitively
fn find_evidence(content: &str, patterns: &[String]) -> Option<String> {
    let patterns: Vec<String> = patterns.iter().map(|p| p.to_lowercase()).collect();
    content
        .lines()
        .find(|line| {
            let lower = line.to_lowercase();
            patterns.iter().any(|p| lower.contains(p.as_str()))
        })
        .map(|line| line.trim().chars().take(MAX_EVIDENCE_CHARS).collect())
}
