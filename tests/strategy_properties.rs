//! Property tests for backoff, selection and adaptation bounds

use autoheal::classifier::{Issue, IssueContext, IssueKind, Severity};
use autoheal::history::HistoryTracker;
use autoheal::orchestrator::{ExecutionContext, Phase, Pipeline};
use autoheal::strategy::{Backoff, DecisionSnapshot, RecoveryAction, StrategyConfig, StrategySelector};
use autoheal::types::{ExitStatus, Operation, OperationId, ParamValue, ParameterChange, Parameters};
use chrono::Utc;
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use uuid::Uuid;

const KINDS: [IssueKind; 6] = [
    IssueKind::Timeout,
    IssueKind::ResourceExhaustion,
    IssueKind::Network,
    IssueKind::Permission,
    IssueKind::Configuration,
    IssueKind::Unknown,
];

const SEVERITIES: [Severity; 4] = [
    Severity::Low,
    Severity::Medium,
    Severity::High,
    Severity::Critical,
];

fn issue(kind: IssueKind, severity: Severity, prior: Vec<IssueKind>) -> Issue {
    Issue {
        kind,
        severity,
        operation: OperationId::from("PR01"),
        phase: "main".to_string(),
        message: format!("PR01 failed with {}", kind),
        context: IssueContext {
            command: "./pr01.sh".to_string(),
            attempt: 1,
            exit_status: ExitStatus::Code(1),
            prior_issues: prior,
            evidence: None,
        },
        log_unavailable: false,
        detected_at: Utc::now(),
    }
}

#[quickcheck]
fn prop_backoff_monotonic_and_capped(base: u16, extra: u16, attempt: u8) -> TestResult {
    let base = u64::from(base) + 1;
    let max = base + u64::from(extra);
    let attempt = u32::from(attempt % 40) + 1;
    let backoff = Backoff::with_config(base, max);

    let current = backoff.delay(attempt);
    let next = backoff.delay(attempt + 1);

    TestResult::from_bool(
        next >= current && next <= backoff.ceiling() && current.as_millis() as u64 >= base.min(max),
    )
}

#[quickcheck]
fn prop_jitter_stays_under_ceiling(attempt: u8, seed: u64) -> bool {
    let backoff = Backoff::new().with_jitter(0.5);
    backoff.jittered_delay(u32::from(attempt % 20) + 1, seed) <= backoff.ceiling()
}

#[quickcheck]
fn prop_decision_is_deterministic(
    kind: u8,
    severity: u8,
    attempt: u8,
    memory: u16,
    optional: bool,
    with_alternative: bool,
) -> bool {
    let kind = KINDS[kind as usize % KINDS.len()];
    let severity = SEVERITIES[severity as usize % SEVERITIES.len()];
    let attempt = u32::from(attempt % 6) + 1;

    let mut params = Parameters::new();
    params.insert("memory_limit_mb".to_string(), ParamValue::Number(u64::from(memory)));

    let alternative = Operation::new("PR01-ALT", "main", "./alt.sh");
    let id = OperationId::from("PR01");
    let snapshot = DecisionSnapshot {
        operation: &id,
        history: &[],
        parameters: &params,
        alternative: with_alternative.then_some(&alternative),
        optional,
        analysis: None,
    };

    let selector = StrategySelector::default();
    let issue = issue(kind, severity, vec![]);

    selector.decide(&issue, attempt, &snapshot) == selector.decide(&issue, attempt, &snapshot)
}

#[quickcheck]
fn prop_critical_never_recovers_automatically(kind: u8, attempt: u8, optional: bool) -> bool {
    let kind = KINDS[kind as usize % KINDS.len()];
    let params = Parameters::new();
    let id = OperationId::from("PR01");
    let snapshot = DecisionSnapshot {
        operation: &id,
        history: &[],
        parameters: &params,
        alternative: None,
        optional,
        analysis: None,
    };

    let action = StrategySelector::default().decide(
        &issue(kind, Severity::Critical, vec![]),
        u32::from(attempt % 6) + 1,
        &snapshot,
    );
    matches!(action, RecoveryAction::Escalate { .. })
}

#[quickcheck]
fn prop_no_retry_at_max_attempts(kind: u8) -> bool {
    let kind = KINDS[kind as usize % KINDS.len()];
    let config = StrategyConfig::default();
    let params = Parameters::new();
    let id = OperationId::from("PR01");
    let snapshot = DecisionSnapshot {
        operation: &id,
        history: &[],
        parameters: &params,
        alternative: None,
        optional: false,
        analysis: None,
    };

    let action = StrategySelector::new(config.clone()).decide(
        &issue(kind, kind.default_severity(), vec![]),
        config.max_attempts,
        &snapshot,
    );
    !matches!(action, RecoveryAction::Retry { .. } | RecoveryAction::Adapt { .. })
}

#[quickcheck]
fn prop_memory_adaptation_respects_ceiling(start: u16) -> bool {
    let config = StrategyConfig::default();
    let selector = StrategySelector::new(config.clone());
    let id = OperationId::from("PR01");

    let mut params = Parameters::new();
    params.insert(config.memory_param.clone(), ParamValue::Number(u64::from(start)));

    // Follow adaptations until the selector stops proposing them
    for _ in 0..32 {
        let snapshot = DecisionSnapshot {
            operation: &id,
            history: &[],
            parameters: &params,
            alternative: None,
            optional: false,
            analysis: None,
        };
        match selector.decide(&issue(IssueKind::ResourceExhaustion, Severity::High, vec![]), 1, &snapshot) {
            RecoveryAction::Adapt { changes } => {
                for change in changes {
                    if change.value.as_number().unwrap_or(0) > config.memory_max_mb {
                        return false;
                    }
                    params.insert(change.key, change.value);
                }
            }
            _ => return true,
        }
    }
    false
}

#[quickcheck]
fn prop_commit_is_idempotent(value: u32) -> bool {
    let config = StrategyConfig::default();
    let op = Operation::new("PR01", "main", "./pr01.sh");
    let pipeline = Pipeline::new("props").with_phase(Phase::new("main").with_operation(op.clone()));
    let mut ctx = ExecutionContext::new(
        &pipeline,
        &Parameters::new(),
        config.bounds(),
        config.timeout_param.clone(),
        HistoryTracker::new(Uuid::new_v4()),
    );

    let change = ParameterChange::set(config.memory_param.clone(), u64::from(value));
    let first = ctx.commit(&op.id, &[change.clone()]);
    let once = ctx.parameters_for(&op);
    let second = ctx.commit(&op.id, &[change]);
    let twice = ctx.parameters_for(&op);

    first == second
        && once == twice
        && once[&config.memory_param].as_number() == Some(u64::from(value).min(config.memory_max_mb))
}
