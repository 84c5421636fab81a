//! Per-run history tracker

use crate::classifier::IssueKind;
use crate::errors::{OrchestratorError, Result};
use crate::history::store::HistoryStore;
use crate::strategy::ActionKind;
use crate::types::{ExecutionResult, ExitStatus, OperationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Outcome of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
    /// Cancelled while the command ran, or before a pending attempt started
    Abandoned,
}

/// One history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub run_id: Uuid,
    pub operation: OperationId,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub exit_status: ExitStatus,
    pub issue_kind: Option<IssueKind>,
    pub action: Option<ActionKind>,
    pub outcome: AttemptOutcome,

    /// Substitute that ran in place of the operation
    pub substitute: Option<OperationId>,
}

impl AttemptRecord {
    /// Entry for an attempt, keyed to the original operation
    pub fn from_result(
        run_id: Uuid,
        operation: &OperationId,
        result: &ExecutionResult,
        outcome: AttemptOutcome,
    ) -> Self {
        let substitute = if &result.operation != operation {
            Some(result.operation.clone())
        } else {
            None
        };

        Self {
            run_id,
            operation: operation.clone(),
            attempt: result.attempt,
            timestamp: result.finished_at,
            exit_status: result.exit_status,
            issue_kind: None,
            action: None,
            outcome,
            substitute,
        }
    }

    /// Entry for an attempt cut short by cancellation
    pub fn abandoned(run_id: Uuid, operation: &OperationId, target: &OperationId, attempt: u32) -> Self {
        Self {
            run_id,
            operation: operation.clone(),
            attempt,
            timestamp: Utc::now(),
            exit_status: ExitStatus::Cancelled,
            issue_kind: None,
            action: None,
            outcome: AttemptOutcome::Abandoned,
            substitute: (target != operation).then(|| target.clone()),
        }
    }

    /// Attach classification and the decision taken
    pub fn with_decision(mut self, kind: IssueKind, action: ActionKind) -> Self {
        self.issue_kind = Some(kind);
        self.action = Some(action);
        self
    }
}

/// Append-only attempt history for one run
pub struct HistoryTracker {
    run_id: Uuid,
    entries: HashMap<OperationId, Vec<AttemptRecord>>,
    store: Option<Arc<dyn HistoryStore>>,
}

impl HistoryTracker {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            entries: HashMap::new(),
            store: None,
        }
    }

    /// Persist every record to a backing store as well
    pub fn with_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Append a record. Attempt indices must strictly increase per operation.
    pub fn record(&mut self, entry: AttemptRecord) -> Result<()> {
        let last = self.last_attempt(&entry.operation);
        if entry.attempt <= last {
            return Err(OrchestratorError::AttemptOutOfOrder {
                operation: entry.operation.to_string(),
                attempt: entry.attempt,
                last,
            });
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.append(&entry) {
                warn!(operation = %entry.operation, error = %e, "history store append failed");
            }
        }

        self.entries
            .entry(entry.operation.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    /// Records of this run for an operation, in attempt order
    pub fn for_operation(&self, operation: &OperationId) -> &[AttemptRecord] {
        self.entries
            .get(operation)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Past outcomes for an operation; prior runs first when requested
    pub fn query(&self, operation: &OperationId, include_prior: bool) -> Vec<AttemptRecord> {
        let mut records = Vec::new();

        if include_prior {
            if let Some(store) = &self.store {
                match store.load(operation) {
                    Ok(prior) => records.extend(prior.into_iter().filter(|r| r.run_id != self.run_id)),
                    Err(e) => warn!(operation = %operation, error = %e, "history store load failed"),
                }
            }
        }

        records.extend(self.for_operation(operation).iter().cloned());
        records
    }

    pub fn last_attempt(&self, operation: &OperationId) -> u32 {
        self.for_operation(operation)
            .last()
            .map(|r| r.attempt)
            .unwrap_or(0)
    }

    /// Issue kinds recorded for an operation in this run
    pub fn issue_kinds(&self, operation: &OperationId) -> Vec<IssueKind> {
        self.for_operation(operation)
            .iter()
            .filter_map(|r| r.issue_kind)
            .collect()
    }

    pub fn total_records(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }
}
