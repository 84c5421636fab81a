//! Recovery action type definitions

use crate::escalation::Analysis;
use crate::history::AttemptRecord;
use crate::types::{Operation, OperationId, ParameterChange, Parameters};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Response selected for one failure
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Wait, then re-invoke the operation unchanged
    Retry { delay: Duration },

    /// Apply parameter changes, then re-invoke
    Adapt { changes: Vec<ParameterChange> },

    /// Run the registered substitute in place of the operation
    AlternativePath { substitute: Box<Operation> },

    /// Hand off to the escalation sink; terminal for the operation
    Escalate { reason: String },

    /// Treat the failure as non-fatal
    Proceed { reason: String },
}

impl RecoveryAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            RecoveryAction::Retry { .. } => ActionKind::Retry,
            RecoveryAction::Adapt { .. } => ActionKind::Adapt,
            RecoveryAction::AlternativePath { .. } => ActionKind::AlternativePath,
            RecoveryAction::Escalate { .. } => ActionKind::Escalate,
            RecoveryAction::Proceed { .. } => ActionKind::Proceed,
        }
    }

    /// No further automatic attempts follow this action
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecoveryAction::Escalate { .. } | RecoveryAction::Proceed { .. })
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryAction::Retry { delay } => write!(f, "retry in {}ms", delay.as_millis()),
            RecoveryAction::Adapt { changes } => {
                let changes: Vec<String> = changes.iter().map(|c| c.to_string()).collect();
                write!(f, "adapt [{}]", changes.join(", "))
            }
            RecoveryAction::AlternativePath { substitute } => {
                write!(f, "substitute {}", substitute.id)
            }
            RecoveryAction::Escalate { reason } => write!(f, "escalate ({})", reason),
            RecoveryAction::Proceed { reason } => write!(f, "proceed ({})", reason),
        }
    }
}

/// Payload-free tag of a recovery action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Retry,
    Adapt,
    AlternativePath,
    Escalate,
    Proceed,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Retry => "retry",
            ActionKind::Adapt => "adapt",
            ActionKind::AlternativePath => "alternative_path",
            ActionKind::Escalate => "escalate",
            ActionKind::Proceed => "proceed",
        };
        f.write_str(name)
    }
}

/// Read-only view of the run context handed to the selector
#[derive(Debug, Clone, Copy)]
pub struct DecisionSnapshot<'a> {
    pub operation: &'a OperationId,

    /// This run's attempts of the operation, excluding the current failure
    pub history: &'a [AttemptRecord],

    /// Effective parameters of the operation
    pub parameters: &'a Parameters,

    /// Substitute still available (not yet used)
    pub alternative: Option<&'a Operation>,

    pub optional: bool,

    /// Cognitive analysis of the current issue, if one was obtained
    pub analysis: Option<&'a Analysis>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_and_terminality() {
        let retry = RecoveryAction::Retry { delay: Duration::from_secs(1) };
        assert_eq!(retry.kind(), ActionKind::Retry);
        assert!(!retry.is_terminal());

        let escalate = RecoveryAction::Escalate { reason: "limits".to_string() };
        assert_eq!(escalate.kind(), ActionKind::Escalate);
        assert!(escalate.is_terminal());

        assert!(RecoveryAction::Proceed { reason: "optional".to_string() }.is_terminal());
    }

    #[test]
    fn test_display() {
        let adapt = RecoveryAction::Adapt {
            changes: vec![ParameterChange::set("memory_limit_mb", 2048u64)],
        };
        assert_eq!(adapt.to_string(), "adapt [memory_limit_mb=2048]");
        assert_eq!(ActionKind::AlternativePath.to_string(), "alternative_path");
    }
}
