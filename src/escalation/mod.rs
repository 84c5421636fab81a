//! Human escalation and external analysis capabilities
//!
//! Escalation is the terminal hand-off for failures automation cannot
//! resolve. Sinks are capabilities injected into the orchestrator; the
//! bundle they receive carries everything a human needs to act.

pub mod analysis;
pub mod sinks;

pub use analysis::{
    Analysis, AnalysisConfig, AnalysisProvider, AnalysisRequest, HttpAnalysisProvider,
    Recommendation,
};
pub use sinks::{LogEscalationSink, WebhookEscalationSink};

use crate::classifier::{Issue, IssueKind, Severity};
use crate::errors::Result;
use crate::history::AttemptRecord;
use crate::strategy::ActionKind;
use crate::types::{ExitStatus, OperationId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Condensed view of one attempt for a human reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt: u32,
    pub exit_status: ExitStatus,
    pub issue_kind: Option<IssueKind>,
    pub action: Option<ActionKind>,
    pub substitute: Option<OperationId>,
}

impl From<&AttemptRecord> for AttemptSummary {
    fn from(record: &AttemptRecord) -> Self {
        Self {
            attempt: record.attempt,
            exit_status: record.exit_status,
            issue_kind: record.issue_kind,
            action: record.action,
            substitute: record.substitute.clone(),
        }
    }
}

/// Everything delivered to a sink on escalation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationBundle {
    pub run_id: Uuid,
    pub pipeline: String,
    pub operation: OperationId,
    pub phase: String,
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,

    /// Why automation gave up
    pub reason: String,

    pub attempts: Vec<AttemptSummary>,
    pub remediation: String,

    /// Free-text analysis, when one was obtained
    pub analysis: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl EscalationBundle {
    pub fn new(
        run_id: Uuid,
        pipeline: impl Into<String>,
        issue: &Issue,
        reason: impl Into<String>,
        history: &[AttemptRecord],
    ) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            operation: issue.operation.clone(),
            phase: issue.phase.clone(),
            kind: issue.kind,
            severity: issue.severity,
            message: issue.message.clone(),
            reason: reason.into(),
            attempts: history.iter().map(AttemptSummary::from).collect(),
            remediation: issue.kind.remediation().to_string(),
            analysis: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the analysis summary; it replaces the canned remediation
    pub fn with_analysis(mut self, summary: impl Into<String>) -> Self {
        let summary = summary.into();
        self.remediation = summary.clone();
        self.analysis = Some(summary);
        self
    }

    /// One-line summary for logs and terminals
    pub fn headline(&self) -> String {
        format!(
            "[{}] {} ({}) in phase '{}': {}",
            self.severity, self.operation, self.kind, self.phase, self.message
        )
    }
}

/// Receipt returned by a sink that accepted a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub sink: String,

    /// Ticket id, message id or similar, if the sink returns one
    pub reference: Option<String>,
}

/// Destination for escalations
#[async_trait]
pub trait EscalationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn escalate(&self, bundle: &EscalationBundle) -> Result<Acknowledgement>;
}
