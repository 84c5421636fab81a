//! Recovery outcome type definitions

use crate::escalation::{Acknowledgement, EscalationBundle};
use crate::types::{Operation, ParameterChange};
use serde::{Deserialize, Serialize};

/// What the next attempt runs
#[derive(Debug, Clone, PartialEq)]
pub enum RetryTarget {
    /// Whatever ran last runs again
    Unchanged,
    Substitute(Box<Operation>),
}

/// Result of a sink hand-off. Produced whether or not delivery worked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationReceipt {
    pub delivered: bool,
    pub sink: String,

    /// Delivery error, when `delivered` is false
    pub error: Option<String>,

    pub acknowledgement: Option<Acknowledgement>,
    pub bundle: EscalationBundle,
}

/// Result of applying a recovery action
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Run another attempt, after committing `changes`
    RetrySignal {
        changes: Vec<ParameterChange>,
        target: RetryTarget,
    },

    /// Failure accepted as non-fatal
    Resolved { reason: String },

    /// Handed to the escalation sink; terminal
    Escalated(EscalationReceipt),

    /// Cancelled before the action completed
    Abandoned,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::RetrySignal { .. })
    }

    pub fn retry() -> Self {
        Outcome::RetrySignal {
            changes: Vec::new(),
            target: RetryTarget::Unchanged,
        }
    }
}
