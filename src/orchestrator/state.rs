//! Per-operation state machine
//!
//! Valid transitions:
//! 1.  Pending      → Running      (on: Start)
//! 2.  Running      → Succeeded    (on: Succeed)
//! 3.  Running      → Failed       (on: Fail)
//! 4.  Failed       → Classifying  (on: Classify)
//! 5.  Classifying  → Deciding     (on: Decide)
//! 6.  Deciding     → Retrying     (on: Chose(Retry))
//! 7.  Deciding     → Adapting     (on: Chose(Adapt))
//! 8.  Deciding     → Substituting (on: Chose(AlternativePath))
//! 9.  Deciding     → Escalated    (on: Chose(Escalate))
//! 10. Deciding     → Proceeded    (on: Chose(Proceed))
//! 11. Retrying | Adapting | Substituting → Running (on: Resume)
//! 12. any non-terminal → Abandoned (on: Cancel)
//!
//! Terminal states accept no events.

use crate::errors::{OrchestratorError, Result};
use crate::strategy::ActionKind;
use crate::types::OperationId;
use serde::{Deserialize, Serialize};

/// Operation lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Classifying,
    Deciding,
    Retrying,
    Adapting,
    Substituting,

    /// Handed to a human (terminal)
    Escalated,

    /// Failure waived for an optional operation (terminal)
    Proceeded,

    /// Cancelled (terminal)
    Abandoned,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    Start,
    Succeed,
    Fail,
    Classify,
    Decide,
    Chose(ActionKind),
    Resume,
    Cancel,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Succeeded
                | OperationState::Escalated
                | OperationState::Proceeded
                | OperationState::Abandoned
        )
    }

    /// Next state for `event`, or `InvalidTransition`
    pub fn transition(&self, operation: &OperationId, event: StateEvent) -> Result<OperationState> {
        use OperationState::*;
        use StateEvent::*;

        let next_state = match (*self, event) {
            (from, Cancel) if !from.is_terminal() => Abandoned,

            (Pending, Start) => Running,

            (Running, Succeed) => Succeeded,
            (Running, Fail) => Failed,

            (Failed, Classify) => Classifying,
            (Classifying, Decide) => Deciding,

            (Deciding, Chose(ActionKind::Retry)) => Retrying,
            (Deciding, Chose(ActionKind::Adapt)) => Adapting,
            (Deciding, Chose(ActionKind::AlternativePath)) => Substituting,
            (Deciding, Chose(ActionKind::Escalate)) => Escalated,
            (Deciding, Chose(ActionKind::Proceed)) => Proceeded,

            (Retrying | Adapting | Substituting, Resume) => Running,

            (from, event) => {
                return Err(OrchestratorError::InvalidTransition {
                    operation: operation.to_string(),
                    from: format!("{:?}", from),
                    to: format!("(via {:?})", event),
                });
            }
        };

        Ok(next_state)
    }
}

/// State holder for one operation, with the path it took
#[derive(Debug, Clone)]
pub struct OperationMachine {
    operation: OperationId,
    state: OperationState,
    path: Vec<OperationState>,
}

impl OperationMachine {
    pub fn new(operation: OperationId) -> Self {
        Self {
            operation,
            state: OperationState::Pending,
            path: vec![OperationState::Pending],
        }
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Every state visited, in order
    pub fn path(&self) -> &[OperationState] {
        &self.path
    }

    pub fn apply(&mut self, event: StateEvent) -> Result<OperationState> {
        let next = self.state.transition(&self.operation, event)?;
        self.state = next;
        self.path.push(next);
        Ok(next)
    }
}
