//! End-to-end recovery scenarios against scripted commands

mod support;

use autoheal::classifier::IssueKind;
use autoheal::history::{AttemptOutcome, HistoryStore, JsonlHistoryStore};
use autoheal::report::FinalOutcome;
use autoheal::strategy::ActionKind;
use autoheal::types::{ExitStatus, OperationId, ParameterChange};
use std::sync::Arc;
use std::time::Duration;
use support::{op, single_phase, Harness, Step};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_timeout_retried_until_success() {
    let harness = Harness::new(vec![(
        "TR01",
        vec![Step::exit(124), Step::timed_out(), Step::ok()],
    )]);
    let pipeline = single_phase(vec![op("TR01")]);

    let started = Instant::now();
    let report = harness
        .orchestrator()
        .run(&pipeline, CancellationToken::new())
        .await
        .unwrap();

    let tr01 = report.operation("TR01").unwrap();
    assert_eq!(tr01.outcome, FinalOutcome::Succeeded);
    assert_eq!(tr01.attempts, 3);
    assert_eq!(tr01.retries, 2);
    assert_eq!(tr01.interventions(), 2);
    assert!(tr01.recovered());

    // 1s then 2s of backoff
    assert!(started.elapsed() >= Duration::from_secs(3));

    assert!(report.success);
    assert_eq!(report.totals.escalations, 0);
    assert_eq!(report.totals.recoveries_succeeded, 1);
    assert!(harness.sink.bundles().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resource_exhaustion_raises_memory() {
    let harness = Harness::new(vec![("AN02", vec![Step::exit(137), Step::ok()])]);
    let pipeline = single_phase(vec![op("AN02")]);

    let report = harness
        .orchestrator()
        .run(&pipeline, CancellationToken::new())
        .await
        .unwrap();

    let an02 = report.operation("AN02").unwrap();
    assert_eq!(an02.outcome, FinalOutcome::Succeeded);
    assert_eq!(an02.adaptations, 1);
    assert_eq!(an02.retries, 0);
    assert_eq!(
        an02.parameter_changes,
        vec![ParameterChange::set("memory_limit_mb", 2048u64)]
    );

    let calls = harness.runner.calls_for("AN02");
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].env.iter().any(|(k, _)| k == "MEMORY_LIMIT_MB"));
    assert!(calls[1]
        .env
        .contains(&("MEMORY_LIMIT_MB".to_string(), "2048".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_permission_without_alternative_escalates_immediately() {
    let harness = Harness::new(vec![("DP01", vec![Step::exit(126)])]);
    let pipeline = single_phase(vec![op("DP01")]);

    let report = harness
        .orchestrator()
        .run(&pipeline, CancellationToken::new())
        .await
        .unwrap();

    let dp01 = report.operation("DP01").unwrap();
    assert_eq!(dp01.outcome, FinalOutcome::Escalated);
    assert_eq!(dp01.retries, 0);
    assert_eq!(dp01.attempts, 1);
    assert_eq!(harness.runner.calls().len(), 1);

    let receipt = dp01.escalation.as_ref().unwrap();
    assert!(receipt.delivered);
    assert_eq!(receipt.bundle.kind, IssueKind::Permission);

    let bundles = harness.sink.bundles();
    assert_eq!(bundles.len(), 1);
    assert_eq!(bundles[0].operation.as_str(), "DP01");
    assert_eq!(bundles[0].attempts.len(), 1);

    assert!(!report.success);
    assert_eq!(report.totals.escalations, 1);
    assert_eq!(report.totals.escalation_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_network_retries_exhausted_then_escalates() {
    let refused = "curl: (7) Failed to connect to api.example.com: Connection refused";
    let harness = Harness::new(vec![(
        "OB01",
        vec![
            Step::exit(1).with_log(refused),
            Step::exit(1).with_log(refused),
            Step::exit(1).with_log(refused),
        ],
    )]);
    let pipeline = single_phase(vec![op("OB01")]);

    let report = harness
        .orchestrator()
        .run(&pipeline, CancellationToken::new())
        .await
        .unwrap();

    let ob01 = report.operation("OB01").unwrap();
    assert_eq!(ob01.outcome, FinalOutcome::Escalated);
    assert_eq!(ob01.attempts, 3);
    assert_eq!(ob01.retries, 2);
    assert_eq!(ob01.last_issue.as_ref().unwrap().kind, IssueKind::Network);

    assert_eq!(report.totals.retries, 2);
    assert_eq!(report.totals.escalations, 1);

    let bundle = &harness.sink.bundles()[0];
    assert_eq!(bundle.attempts.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_abandons() {
    let harness = Harness::new(vec![("TR01", vec![Step::exit(124), Step::ok()])]);
    let pipeline = single_phase(vec![op("TR01"), op("TR02")]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let report = harness.orchestrator().run(&pipeline, cancel).await.unwrap();

    let tr01 = report.operation("TR01").unwrap();
    assert_eq!(tr01.outcome, FinalOutcome::Abandoned);
    assert!(tr01.escalation.is_none());
    assert_eq!(report.operation("TR02").unwrap().outcome, FinalOutcome::NotRun);

    assert!(report.cancelled);
    assert!(!report.success);
    assert_eq!(report.halted_at.as_deref(), Some("main"));
    assert_eq!(report.totals.abandoned, 1);
    assert_eq!(report.totals.escalations, 0);
    assert!(harness.sink.bundles().is_empty());
    assert_eq!(harness.runner.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonlHistoryStore::new(dir.path().join("history.jsonl")).unwrap());
    let harness = Harness::new(vec![("TR01", vec![Step::exit(124), Step::ok()])]);
    let pipeline = single_phase(vec![op("TR01")]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let report = harness
        .builder()
        .history_store(store.clone())
        .build()
        .run(&pipeline, cancel)
        .await
        .unwrap();
    assert_eq!(report.operation("TR01").unwrap().outcome, FinalOutcome::Abandoned);

    let records = store.load(&OperationId::from("TR01")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].outcome, AttemptOutcome::Failed);
    assert_eq!(records[0].action, Some(ActionKind::Retry));
    assert_eq!(records[1].attempt, 2);
    assert_eq!(records[1].outcome, AttemptOutcome::Abandoned);
    assert_eq!(records[1].exit_status, ExitStatus::Cancelled);
    assert_eq!(records[1].run_id, report.run_id);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_command_running() {
    let harness = Harness::new(vec![(
        "TR01",
        vec![Step::ok().taking(Duration::from_secs(60))],
    )]);
    let pipeline = single_phase(vec![op("TR01")]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonlHistoryStore::new(dir.path().join("history.jsonl")).unwrap());
    let report = harness
        .builder()
        .history_store(store.clone())
        .build()
        .run(&pipeline, cancel)
        .await
        .unwrap();

    assert_eq!(report.operation("TR01").unwrap().outcome, FinalOutcome::Abandoned);
    assert!(report.cancelled);

    let records = store.load(&OperationId::from("TR01")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempt, 1);
    assert_eq!(records[0].outcome, AttemptOutcome::Abandoned);
    assert!(records[0].issue_kind.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_successful_operations_leave_no_issue() {
    let harness = Harness::new(vec![]);
    let pipeline = single_phase(vec![op("OB01"), op("CL01")]);

    let report = harness
        .orchestrator()
        .run(&pipeline, CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    for id in ["OB01", "CL01"] {
        let op = report.operation(id).unwrap();
        assert_eq!(op.outcome, FinalOutcome::Succeeded);
        assert_eq!(op.attempts, 1);
        assert!(op.last_issue.is_none());
    }
    assert_eq!(report.totals.interventions, 0);
    assert_eq!(harness.runner.call_order(), vec!["OB01", "CL01"]);
}
