//! Run report
//!
//! Built once, after every operation of the run has reached a terminal
//! state (or was never started). For each operation that failed at least
//! once it shows the final outcome and how many autonomous interventions
//! were made.

use crate::classifier::{Issue, IssueKind, Severity};
use crate::recovery::EscalationReceipt;
use crate::types::{OperationId, ParameterChange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Final outcome of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalOutcome {
    Succeeded,
    SucceededViaSubstitute,

    /// Optional operation failed; failure waived
    Proceeded,

    Escalated,

    /// Cancelled while running or waiting
    Abandoned,

    /// Never started (run halted or cancelled earlier)
    NotRun,
}

impl FinalOutcome {
    /// Counts toward phase completion
    pub fn completes_phase(&self) -> bool {
        matches!(
            self,
            FinalOutcome::Succeeded | FinalOutcome::SucceededViaSubstitute | FinalOutcome::Proceeded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinalOutcome::Succeeded => "succeeded",
            FinalOutcome::SucceededViaSubstitute => "succeeded via substitute",
            FinalOutcome::Proceeded => "proceeded",
            FinalOutcome::Escalated => "escalated",
            FinalOutcome::Abandoned => "abandoned",
            FinalOutcome::NotRun => "not run",
        }
    }
}

impl fmt::Display for FinalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last classified issue of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub log_unavailable: bool,
}

impl From<&Issue> for IssueSummary {
    fn from(issue: &Issue) -> Self {
        Self {
            kind: issue.kind,
            severity: issue.severity,
            message: issue.message.clone(),
            log_unavailable: issue.log_unavailable,
        }
    }
}

/// Per-operation report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    pub operation: OperationId,
    pub outcome: FinalOutcome,
    pub attempts: u32,

    pub retries: u32,
    pub adaptations: u32,
    pub substitutions: u32,

    /// Substitute that ran in place of the operation
    pub substitute: Option<OperationId>,

    pub parameter_changes: Vec<ParameterChange>,
    pub last_issue: Option<IssueSummary>,

    /// Why a failure was waived
    pub proceed_reason: Option<String>,

    pub escalation: Option<EscalationReceipt>,
    pub duration_ms: u64,
}

impl OperationReport {
    pub fn new(operation: OperationId) -> Self {
        Self {
            operation,
            outcome: FinalOutcome::NotRun,
            attempts: 0,
            retries: 0,
            adaptations: 0,
            substitutions: 0,
            substitute: None,
            parameter_changes: Vec::new(),
            last_issue: None,
            proceed_reason: None,
            escalation: None,
            duration_ms: 0,
        }
    }

    /// Retries, adaptations and substitutions made without a human
    pub fn interventions(&self) -> u32 {
        self.retries + self.adaptations + self.substitutions
    }

    pub fn failed_at_least_once(&self) -> bool {
        self.last_issue.is_some()
    }

    /// Succeeded after at least one intervention
    pub fn recovered(&self) -> bool {
        self.interventions() > 0
            && matches!(
                self.outcome,
                FinalOutcome::Succeeded | FinalOutcome::SucceededViaSubstitute
            )
    }
}

/// Per-phase report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub name: String,
    pub non_blocking: bool,
    pub success: bool,
    pub duration_ms: u64,
    pub operations: Vec<OperationReport>,
}

impl PhaseReport {
    pub fn new(name: impl Into<String>, non_blocking: bool, operations: Vec<OperationReport>) -> Self {
        let success = operations.iter().all(|op| op.outcome.completes_phase());
        Self {
            name: name.into(),
            non_blocking,
            success,
            duration_ms: 0,
            operations,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }
}

/// Aggregate counts across the run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub interventions: u32,
    pub retries: u32,
    pub adaptations: u32,
    pub substitutions: u32,
    pub proceeds: u32,
    pub recoveries_succeeded: u32,
    pub escalations: u32,

    /// Escalations whose sink could not be reached
    pub escalation_failures: u32,

    pub abandoned: u32,
}

impl RunTotals {
    fn from_phases(phases: &[PhaseReport]) -> Self {
        let mut totals = RunTotals::default();

        for op in phases.iter().flat_map(|p| p.operations.iter()) {
            totals.interventions += op.interventions();
            totals.retries += op.retries;
            totals.adaptations += op.adaptations;
            totals.substitutions += op.substitutions;

            if op.recovered() {
                totals.recoveries_succeeded += 1;
            }

            match op.outcome {
                FinalOutcome::Proceeded => totals.proceeds += 1,
                FinalOutcome::Abandoned => totals.abandoned += 1,
                FinalOutcome::Escalated => {
                    totals.escalations += 1;
                    if op.escalation.as_ref().map_or(true, |r| !r.delivered) {
                        totals.escalation_failures += 1;
                    }
                }
                _ => {}
            }
        }

        totals
    }
}

/// Summary of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub success: bool,

    /// Phase whose failure (or cancellation) stopped the run
    pub halted_at: Option<String>,

    pub cancelled: bool,
    pub phases: Vec<PhaseReport>,
    pub totals: RunTotals,
}

impl RunReport {
    pub fn new(
        run_id: Uuid,
        pipeline: impl Into<String>,
        started_at: DateTime<Utc>,
        phases: Vec<PhaseReport>,
        halted_at: Option<String>,
        cancelled: bool,
    ) -> Self {
        let finished_at = Utc::now();
        let elapsed_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        let success = !cancelled && halted_at.is_none() && phases.iter().all(|p| p.success);
        let totals = RunTotals::from_phases(&phases);

        Self {
            run_id,
            pipeline: pipeline.into(),
            started_at,
            finished_at,
            elapsed_ms,
            success,
            halted_at,
            cancelled,
            phases,
            totals,
        }
    }

    pub fn operation(&self, id: &str) -> Option<&OperationReport> {
        self.phases
            .iter()
            .flat_map(|p| p.operations.iter())
            .find(|op| op.operation.as_str() == id)
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Operations that needed attention
    pub fn failed_operations(&self) -> impl Iterator<Item = &OperationReport> {
        self.phases
            .iter()
            .flat_map(|p| p.operations.iter())
            .filter(|op| op.failed_at_least_once() || op.outcome == FinalOutcome::Abandoned)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text summary, one line per entry
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Run {} of '{}': {} in {:.1}s",
            self.run_id,
            self.pipeline,
            if self.success { "succeeded" } else { "failed" },
            self.elapsed_ms as f64 / 1000.0
        )];

        if self.cancelled {
            lines.push("Run was cancelled".to_string());
        }
        if let Some(phase) = &self.halted_at {
            lines.push(format!("Halted at phase '{}'", phase));
        }

        for phase in &self.phases {
            lines.push(format!(
                "Phase '{}': {} in {:.1}s{}",
                phase.name,
                if phase.success { "ok" } else { "failed" },
                phase.duration_ms as f64 / 1000.0,
                if phase.non_blocking { " (non-blocking)" } else { "" }
            ));
        }

        for op in self.failed_operations() {
            let mut line = format!(
                "  {} {} after {} attempt(s), {} intervention(s)",
                op.operation,
                op.outcome,
                op.attempts,
                op.interventions()
            );
            if let Some(issue) = &op.last_issue {
                line.push_str(&format!(" [{} / {}]", issue.kind, issue.severity));
            }
            if let Some(receipt) = &op.escalation {
                if !receipt.delivered {
                    line.push_str(" (escalation attempted, sink unreachable)");
                }
            }
            lines.push(line);
        }

        let t = &self.totals;
        lines.push(format!(
            "Interventions: {} (retries {}, adaptations {}, substitutions {}), recovered: {}, proceeded: {}, escalations: {}, abandoned: {}",
            t.interventions,
            t.retries,
            t.adaptations,
            t.substitutions,
            t.recoveries_succeeded,
            t.proceeds,
            t.escalations,
            t.abandoned
        ));

        lines
    }
}
