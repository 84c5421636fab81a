//! Shared test doubles for orchestrator integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use autoheal::errors::{OrchestratorError, Result};
use autoheal::escalation::{
    Acknowledgement, Analysis, AnalysisProvider, AnalysisRequest, EscalationBundle, EscalationSink,
};
use autoheal::orchestrator::{Orchestrator, OrchestratorBuilder, Phase, Pipeline};
use autoheal::runner::{CommandRunner, InMemoryLogStore, RunRequest};
use autoheal::types::{ExecutionResult, ExitStatus, Operation};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted attempt
#[derive(Debug, Clone)]
pub struct Step {
    pub status: ExitStatus,
    pub log: Option<String>,
    pub delay: Duration,
}

impl Step {
    pub fn ok() -> Self {
        Self::exit(0)
    }

    pub fn exit(code: i32) -> Self {
        Self {
            status: ExitStatus::Code(code),
            log: None,
            delay: Duration::ZERO,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            status: ExitStatus::TimedOut,
            log: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_log(mut self, log: &str) -> Self {
        self.log = Some(log.to_string());
        self
    }

    /// Command takes this long before finishing
    pub fn taking(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Runner replaying scripted exit statuses per operation; unscripted attempts succeed
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    logs: Arc<InMemoryLogStore>,
    calls: Mutex<Vec<RunRequest>>,
}

impl ScriptedRunner {
    pub fn new(logs: Arc<InMemoryLogStore>) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            logs,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(self, operation: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(operation.to_string(), steps.into());
        self
    }

    pub fn calls(&self) -> Vec<RunRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, operation: &str) -> Vec<RunRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation.as_str() == operation)
            .collect()
    }

    pub fn call_order(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.operation.to_string())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, request: &RunRequest) -> Result<ExecutionResult> {
        self.calls.lock().unwrap().push(request.clone());

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(request.operation.as_str())
            .and_then(|steps| steps.pop_front())
            .unwrap_or_else(Step::ok);

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }

        let content = step.log.unwrap_or_default();
        let log = self.logs.insert(
            format!("{}-{}", request.operation, request.attempt),
            content,
        );

        Ok(ExecutionResult::new(
            request.operation.clone(),
            request.attempt,
            step.status,
            Some(log),
            step.delay,
        ))
    }
}

/// Sink keeping every bundle it receives
#[derive(Default)]
pub struct RecordingSink {
    bundles: Mutex<Vec<EscalationBundle>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundles(&self) -> Vec<EscalationBundle> {
        self.bundles.lock().unwrap().clone()
    }
}

#[async_trait]
impl EscalationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn escalate(&self, bundle: &EscalationBundle) -> Result<Acknowledgement> {
        let mut bundles = self.bundles.lock().unwrap();
        bundles.push(bundle.clone());
        Ok(Acknowledgement {
            sink: "recording".to_string(),
            reference: Some(format!("TICKET-{}", bundles.len())),
        })
    }
}

/// Sink that is always unreachable
pub struct FailingSink;

#[async_trait]
impl EscalationSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn escalate(&self, _bundle: &EscalationBundle) -> Result<Acknowledgement> {
        Err(OrchestratorError::EscalationError("connection refused".to_string()))
    }
}

/// Analysis provider returning a fixed answer
pub struct FixedAnalysis {
    analysis: Analysis,
    calls: AtomicUsize,
}

impl FixedAnalysis {
    pub fn new(analysis: Analysis) -> Self {
        Self {
            analysis,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisProvider for FixedAnalysis {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.analysis.clone())
    }
}

/// Everything a scenario needs
pub struct Harness {
    pub runner: Arc<ScriptedRunner>,
    pub logs: Arc<InMemoryLogStore>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(scripts: Vec<(&str, Vec<Step>)>) -> Self {
        let logs = Arc::new(InMemoryLogStore::new());
        let runner = scripts
            .into_iter()
            .fold(ScriptedRunner::new(Arc::clone(&logs)), |runner, (op, steps)| {
                runner.script(op, steps)
            });

        Self {
            runner: Arc::new(runner),
            logs,
            sink: Arc::new(RecordingSink::new()),
        }
    }

    pub fn builder(&self) -> OrchestratorBuilder {
        Orchestrator::builder(self.runner.clone(), self.logs.clone()).escalation_sink(self.sink.clone())
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.builder().build()
    }
}

/// Single-phase pipeline with the given operations
pub fn single_phase(operations: Vec<Operation>) -> Pipeline {
    let phase = operations
        .into_iter()
        .fold(Phase::new("main"), |phase, op| phase.with_operation(op));
    Pipeline::new("test-pipeline").with_phase(phase)
}

pub fn op(id: &str) -> Operation {
    Operation::new(id, "", format!("./{}.sh", id.to_lowercase()))
}
