//! Run-scoped execution context
//!
//! Owned by the orchestrator for one run. Holds parameter overrides and
//! attempt history. Other components get read-only
//! snapshots and propose changes; only the orchestrator commits them,
//! between attempts.

use crate::errors::Result;
use crate::escalation::Analysis;
use crate::history::{AttemptRecord, HistoryTracker};
use crate::orchestrator::pipeline::Pipeline;
use crate::strategy::DecisionSnapshot;
use crate::types::{
    Operation, OperationId, ParamValue, ParameterBounds, ParameterChange, Parameters,
};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub struct ExecutionContext {
    run_id: Uuid,
    pipeline: String,

    /// Pipeline parameters overlaid with run-level values
    base: Parameters,

    /// Committed adaptations, per operation
    overrides: HashMap<OperationId, Parameters>,

    bounds: ParameterBounds,

    /// Parameter key mirroring an operation's timeout
    timeout_param: String,

    history: HistoryTracker,
    used_alternatives: HashSet<OperationId>,
}

impl ExecutionContext {
    pub fn new(
        pipeline: &Pipeline,
        run_parameters: &Parameters,
        bounds: ParameterBounds,
        timeout_param: impl Into<String>,
        history: HistoryTracker,
    ) -> Self {
        let mut base = pipeline.parameters.clone();
        base.extend(run_parameters.iter().map(|(k, v)| (k.clone(), v.clone())));

        Self {
            run_id: history.run_id(),
            pipeline: pipeline.name.clone(),
            base,
            overrides: HashMap::new(),
            bounds,
            timeout_param: timeout_param.into(),
            history,
            used_alternatives: HashSet::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    pub fn record(&mut self, entry: AttemptRecord) -> Result<()> {
        self.history.record(entry)
    }

    /// Effective parameters: base, then the operation's declared timeout,
    /// then committed overrides
    pub fn parameters_for(&self, operation: &Operation) -> Parameters {
        let mut params = self.base.clone();

        if let Some(secs) = operation.timeout_secs {
            params.insert(self.timeout_param.clone(), ParamValue::Number(secs));
        }

        if let Some(overrides) = self.overrides.get(&operation.id) {
            params.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        params
    }

    /// Apply proposed changes, clamped to bounds; last writer wins per key.
    /// Returns the changes as applied.
    pub fn commit(&mut self, operation: &OperationId, changes: &[ParameterChange]) -> Vec<ParameterChange> {
        let overrides = self.overrides.entry(operation.clone()).or_default();

        changes
            .iter()
            .map(|change| {
                let applied = self.bounds.clamp(change);
                overrides.insert(applied.key.clone(), applied.value.clone());
                applied
            })
            .collect()
    }

    /// Substitute registered for `operation` and not yet used this run
    pub fn alternative_for<'a>(&self, operation: &'a Operation) -> Option<&'a Operation> {
        if self.used_alternatives.contains(&operation.id) {
            return None;
        }
        operation.alternative.as_deref()
    }

    pub fn mark_alternative_used(&mut self, operation: &OperationId) {
        self.used_alternatives.insert(operation.clone());
    }

    /// Read-only view for the selector
    pub fn snapshot<'a>(
        &'a self,
        operation: &'a Operation,
        parameters: &'a Parameters,
        analysis: Option<&'a Analysis>,
    ) -> DecisionSnapshot<'a> {
        DecisionSnapshot {
            operation: &operation.id,
            history: self.history.for_operation(&operation.id),
            parameters,
            alternative: self.alternative_for(operation),
            optional: operation.optional,
            analysis,
        }
    }
}
