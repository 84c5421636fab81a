//! Orchestrator run loop
//!
//! Drives phases in declared order and operations within a phase
//! sequentially. On each failure: classify, consult analysis (optional),
//! decide, apply, commit proposed changes, record history. Cancellation is
//! checked between operations and attempts, and interrupts running
//! commands and backoff waits.

use crate::classifier::{ClassifierConfig, Issue, IssueClassifier, OperationContext};
use crate::errors::{OrchestratorError, Result};
use crate::escalation::{
    Analysis, AnalysisConfig, AnalysisProvider, AnalysisRequest, EscalationSink, LogEscalationSink,
};
use crate::history::{AttemptOutcome, AttemptRecord, HistoryStore, HistoryTracker};
use crate::orchestrator::context::ExecutionContext;
use crate::orchestrator::pipeline::{Phase, Pipeline};
use crate::orchestrator::state::{OperationMachine, StateEvent};
use crate::recovery::{Outcome, RecoveryConfig, RecoveryExecutor, RecoveryRequest, RetryTarget};
use crate::report::{FinalOutcome, IssueSummary, OperationReport, PhaseReport, RunReport};
use crate::runner::{CommandRunner, LogStore, RunRequest};
use crate::strategy::{ActionKind, StrategyConfig, StrategySelector};
use crate::types::{env_key, render_command, ExecutionResult, Operation, ParamValue, Parameters};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default command timeout ceiling (1 hour)
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 3600;

/// Builder for `Orchestrator`
pub struct OrchestratorBuilder {
    runner: Arc<dyn CommandRunner>,
    logs: Arc<dyn LogStore>,
    sink: Option<Arc<dyn EscalationSink>>,
    analysis: Option<Arc<dyn AnalysisProvider>>,
    history_store: Option<Arc<dyn HistoryStore>>,
    classifier_config: ClassifierConfig,
    strategy_config: StrategyConfig,
    recovery_config: RecoveryConfig,
    analysis_config: AnalysisConfig,
    parameters: Parameters,
    default_timeout: Duration,
}

impl OrchestratorBuilder {
    pub fn escalation_sink(mut self, sink: Arc<dyn EscalationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn analysis_provider(mut self, provider: Arc<dyn AnalysisProvider>) -> Self {
        self.analysis = Some(provider);
        self
    }

    pub fn history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history_store = Some(store);
        self
    }

    pub fn classifier_config(mut self, config: ClassifierConfig) -> Self {
        self.classifier_config = config;
        self
    }

    pub fn strategy_config(mut self, config: StrategyConfig) -> Self {
        self.strategy_config = config;
        self
    }

    pub fn recovery_config(mut self, config: RecoveryConfig) -> Self {
        self.recovery_config = config;
        self
    }

    pub fn analysis_config(mut self, config: AnalysisConfig) -> Self {
        self.analysis_config = config;
        self
    }

    /// Run-level parameter values, layered over the pipeline's
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn build(self) -> Orchestrator {
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(LogEscalationSink::new()));
        let selector = StrategySelector::new(self.strategy_config)
            .with_confidence_threshold(self.analysis_config.confidence_threshold);

        Orchestrator {
            classifier: IssueClassifier::with_config(self.classifier_config),
            selector,
            executor: RecoveryExecutor::with_config(sink, self.recovery_config),
            runner: self.runner,
            logs: self.logs,
            analysis: self.analysis,
            analysis_config: self.analysis_config,
            history_store: self.history_store,
            parameters: self.parameters,
            default_timeout: self.default_timeout,
        }
    }
}

/// Pipeline orchestrator
pub struct Orchestrator {
    classifier: IssueClassifier,
    selector: StrategySelector,
    executor: RecoveryExecutor,
    runner: Arc<dyn CommandRunner>,
    logs: Arc<dyn LogStore>,
    analysis: Option<Arc<dyn AnalysisProvider>>,
    analysis_config: AnalysisConfig,
    history_store: Option<Arc<dyn HistoryStore>>,
    parameters: Parameters,
    default_timeout: Duration,
}

impl Orchestrator {
    pub fn builder(runner: Arc<dyn CommandRunner>, logs: Arc<dyn LogStore>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            runner,
            logs,
            sink: None,
            analysis: None,
            history_store: None,
            classifier_config: ClassifierConfig::default(),
            strategy_config: StrategyConfig::default(),
            recovery_config: RecoveryConfig::default(),
            analysis_config: AnalysisConfig::default(),
            parameters: Parameters::new(),
            default_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }

    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }

    /// Run a pipeline to completion, halt or cancellation.
    ///
    /// Errors only for invalid definitions and broken bookkeeping; command
    /// failures end up in the report.
    pub async fn run(&self, pipeline: &Pipeline, cancel: CancellationToken) -> Result<RunReport> {
        pipeline.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let mut history = HistoryTracker::new(run_id);
        if let Some(store) = &self.history_store {
            history = history.with_store(Arc::clone(store));
        }

        let config = self.selector.config();
        let mut ctx = ExecutionContext::new(
            pipeline,
            &self.parameters,
            self.selector.bounds().clone(),
            config.timeout_param.clone(),
            history,
        );

        info!(
            %run_id,
            pipeline = %pipeline.name,
            phases = pipeline.phases.len(),
            operations = pipeline.operation_count(),
            "run started"
        );

        let mut phases = Vec::with_capacity(pipeline.phases.len());
        let mut halted_at = None;

        for phase in &pipeline.phases {
            if halted_at.is_some() || cancel.is_cancelled() {
                phases.push(not_run(phase));
                continue;
            }

            let report = self.run_phase(phase, &mut ctx, &cancel).await?;

            if cancel.is_cancelled() {
                warn!(phase = %phase.name, "run cancelled");
                halted_at = Some(phase.name.clone());
            } else if !report.success && !phase.non_blocking {
                warn!(phase = %phase.name, "phase failed, halting run");
                halted_at = Some(phase.name.clone());
            } else if !report.success {
                warn!(phase = %phase.name, "non-blocking phase failed, continuing");
            }

            phases.push(report);
        }

        let report = RunReport::new(
            run_id,
            &pipeline.name,
            started_at,
            phases,
            halted_at,
            cancel.is_cancelled(),
        );

        info!(
            %run_id,
            success = report.success,
            interventions = report.totals.interventions,
            escalations = report.totals.escalations,
            history_records = ctx.history().total_records(),
            elapsed_ms = report.elapsed_ms,
            "run finished"
        );

        Ok(report)
    }

    async fn run_phase(
        &self,
        phase: &Phase,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<PhaseReport> {
        info!(phase = %phase.name, operations = phase.operations.len(), "phase started");
        let started = Instant::now();

        let mut reports = Vec::with_capacity(phase.operations.len());
        let mut stopped = false;

        for operation in &phase.operations {
            if stopped || cancel.is_cancelled() {
                reports.push(OperationReport::new(operation.id.clone()));
                continue;
            }

            let report = self.run_operation(operation, ctx, cancel).await?;
            if !report.outcome.completes_phase() && !phase.non_blocking {
                stopped = true;
            }
            reports.push(report);
        }

        let report = PhaseReport::new(phase.name.clone(), phase.non_blocking, reports)
            .with_duration(started.elapsed());
        info!(phase = %phase.name, success = report.success, duration_ms = report.duration_ms, "phase finished");
        Ok(report)
    }

    async fn run_operation(
        &self,
        operation: &Operation,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<OperationReport> {
        let started = Instant::now();
        let mut machine = OperationMachine::new(operation.id.clone());
        let mut report = OperationReport::new(operation.id.clone());
        let mut target = operation.clone();
        let mut attempt = ctx.history().last_attempt(&operation.id);

        machine.apply(StateEvent::Start)?;

        loop {
            attempt += 1;
            let params = ctx.parameters_for(operation);
            let request = self.build_request(&target, attempt, &params);

            // Decisions see the timeout actually enforced on this attempt
            let mut effective = params.clone();
            effective
                .entry(self.selector.config().timeout_param.clone())
                .or_insert(ParamValue::Number(request.timeout.as_secs()));

            debug!(operation = %operation.id, target = %target.id, attempt, command = %request.command, "running");

            let result = tokio::select! {
                result = self.runner.run(&request) => match result {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(operation = %operation.id, attempt, error = %e, "runner failed to execute command");
                        ExecutionResult::launch_failure(target.id.clone(), attempt, e.to_string())
                    }
                },
                _ = cancel.cancelled() => {
                    warn!(operation = %operation.id, attempt, "cancelled while running");
                    ctx.record(AttemptRecord::abandoned(ctx.run_id(), &operation.id, &target.id, attempt))?;
                    machine.apply(StateEvent::Cancel)?;
                    report.attempts = attempt;
                    report.outcome = FinalOutcome::Abandoned;
                    break;
                }
            };
            report.attempts = attempt;

            if result.is_success() {
                machine.apply(StateEvent::Succeed)?;
                ctx.record(AttemptRecord::from_result(
                    ctx.run_id(),
                    &operation.id,
                    &result,
                    AttemptOutcome::Succeeded,
                ))?;
                report.outcome = if target.id == operation.id {
                    FinalOutcome::Succeeded
                } else {
                    FinalOutcome::SucceededViaSubstitute
                };
                info!(operation = %operation.id, attempt, outcome = %report.outcome, "operation finished");
                break;
            }

            machine.apply(StateEvent::Fail)?;
            machine.apply(StateEvent::Classify)?;

            let issue = self.classify(operation, &request.command, &result, ctx)?;
            warn!(
                operation = %operation.id,
                attempt,
                kind = %issue.kind,
                severity = %issue.severity,
                "{}",
                issue.message
            );

            machine.apply(StateEvent::Decide)?;

            let analysis = self
                .consult_analysis(&issue, ctx, &effective)
                .await
                .filter(|a| a.is_confident(self.analysis_config.confidence_threshold));

            let action = self
                .selector
                .decide(&issue, attempt, &ctx.snapshot(operation, &effective, analysis.as_ref()));
            let kind = action.kind();
            info!(operation = %operation.id, attempt, kind = %issue.kind, action = %action, "recovery decided");

            ctx.record(
                AttemptRecord::from_result(ctx.run_id(), &operation.id, &result, AttemptOutcome::Failed)
                    .with_decision(issue.kind, kind),
            )?;
            report.last_issue = Some(IssueSummary::from(&issue));
            machine.apply(StateEvent::Chose(kind))?;

            let history = ctx.history().for_operation(&operation.id).to_vec();
            let request = RecoveryRequest {
                run_id: ctx.run_id(),
                pipeline: ctx.pipeline(),
                issue: &issue,
                history: &history,
                analysis: analysis.as_ref(),
            };

            match self.executor.apply(action, &request, cancel).await {
                Outcome::RetrySignal { changes, target: next } => {
                    match kind {
                        ActionKind::Retry => report.retries += 1,
                        ActionKind::Adapt => report.adaptations += 1,
                        ActionKind::AlternativePath => report.substitutions += 1,
                        ActionKind::Escalate | ActionKind::Proceed => {}
                    }

                    if !changes.is_empty() {
                        let applied = ctx.commit(&operation.id, &changes);
                        for change in &applied {
                            info!(operation = %operation.id, change = %change, "parameter adapted");
                        }
                        report.parameter_changes.extend(applied);
                    }

                    if let RetryTarget::Substitute(substitute) = next {
                        ctx.mark_alternative_used(&operation.id);
                        report.substitute = Some(substitute.id.clone());
                        target = *substitute;
                    }

                    if cancel.is_cancelled() {
                        ctx.record(AttemptRecord::abandoned(ctx.run_id(), &operation.id, &target.id, attempt + 1))?;
                        machine.apply(StateEvent::Cancel)?;
                        report.outcome = FinalOutcome::Abandoned;
                        break;
                    }
                    machine.apply(StateEvent::Resume)?;
                }
                Outcome::Resolved { reason } => {
                    report.outcome = FinalOutcome::Proceeded;
                    report.proceed_reason = Some(reason);
                    break;
                }
                Outcome::Escalated(receipt) => {
                    report.outcome = FinalOutcome::Escalated;
                    report.escalation = Some(receipt);
                    break;
                }
                Outcome::Abandoned => {
                    warn!(operation = %operation.id, attempt, "cancelled during recovery");
                    ctx.record(AttemptRecord::abandoned(ctx.run_id(), &operation.id, &target.id, attempt + 1))?;
                    machine.apply(StateEvent::Cancel)?;
                    report.outcome = FinalOutcome::Abandoned;
                    break;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        debug!(operation = %operation.id, path = ?machine.path(), "state path");
        Ok(report)
    }

    fn build_request(&self, target: &Operation, attempt: u32, params: &Parameters) -> RunRequest {
        let timeout_param = &self.selector.config().timeout_param;
        let timeout = params
            .get(timeout_param)
            .and_then(ParamValue::as_number)
            .map(Duration::from_secs)
            .or_else(|| target.timeout())
            .unwrap_or(self.default_timeout);

        RunRequest {
            operation: target.id.clone(),
            phase: target.phase.clone(),
            attempt,
            command: render_command(&target.command, params),
            working_dir: target.working_dir.clone(),
            env: params
                .iter()
                .map(|(key, value)| (env_key(key), value.to_string()))
                .collect(),
            timeout,
        }
    }

    fn classify(
        &self,
        operation: &Operation,
        command: &str,
        result: &ExecutionResult,
        ctx: &ExecutionContext,
    ) -> Result<Issue> {
        let op_ctx = OperationContext {
            operation,
            command,
            prior_issues: ctx.history().issue_kinds(&operation.id),
        };

        self.classifier
            .classify(result, &op_ctx, self.logs.as_ref())
            .ok_or_else(|| {
                OrchestratorError::Generic(format!(
                    "failed attempt {} of '{}' produced no issue",
                    result.attempt, operation.id
                ))
            })
    }

    async fn consult_analysis(
        &self,
        issue: &Issue,
        ctx: &ExecutionContext,
        params: &Parameters,
    ) -> Option<Analysis> {
        let provider = self.analysis.as_ref()?;
        if issue.is_critical() || !self.analysis_config.applies_to(issue) {
            return None;
        }

        let request = AnalysisRequest {
            issue: issue.clone(),
            history: ctx.history().query(&issue.operation, true),
            parameters: params.clone(),
        };

        match tokio::time::timeout(self.analysis_config.timeout(), provider.analyze(&request)).await {
            Ok(Ok(analysis)) => {
                debug!(operation = %issue.operation, confidence = analysis.confidence, "analysis received");
                Some(analysis)
            }
            Ok(Err(e)) => {
                warn!(operation = %issue.operation, error = %e, "analysis failed, using default strategy");
                None
            }
            Err(_) => {
                warn!(operation = %issue.operation, "analysis timed out, using default strategy");
                None
            }
        }
    }
}

fn not_run(phase: &Phase) -> PhaseReport {
    let operations = phase
        .operations
        .iter()
        .map(|op| OperationReport::new(op.id.clone()))
        .collect();
    PhaseReport::new(phase.name.clone(), phase.non_blocking, operations)
}
