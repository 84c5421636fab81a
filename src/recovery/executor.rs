//! Recovery executor
//!
//! Applies one `RecoveryAction`:
//! - Retry waits out the backoff delay, abandoning if the run is cancelled meanwhile
//! - Adapt optionally settles, then proposes its parameter changes
//! - AlternativePath schedules the substitute as the next attempt
//! - Escalate delivers a bundle to the sink under a timeout, once
//! - Proceed resolves the failure
//!
//! Parameter changes are not applied here; the orchestrator commits them
//! against the declared bounds so a repeated adaptation is idempotent.

use crate::classifier::Issue;
use crate::escalation::{Analysis, EscalationBundle, EscalationSink};
use crate::history::AttemptRecord;
use crate::recovery::types::{EscalationReceipt, Outcome, RetryTarget};
use crate::strategy::RecoveryAction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default escalation delivery timeout (10 seconds)
pub const DEFAULT_ESCALATION_TIMEOUT_MS: u64 = 10_000;

/// Recovery executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Pause after an adaptation before the next attempt
    pub adapt_settle_ms: u64,

    /// Upper bound on a single sink delivery
    pub escalation_timeout_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            adapt_settle_ms: 0,
            escalation_timeout_ms: DEFAULT_ESCALATION_TIMEOUT_MS,
        }
    }
}

/// Context an escalation bundle is assembled from
#[derive(Debug, Clone, Copy)]
pub struct RecoveryRequest<'a> {
    pub run_id: Uuid,
    pub pipeline: &'a str,
    pub issue: &'a Issue,
    pub history: &'a [AttemptRecord],
    pub analysis: Option<&'a Analysis>,
}

pub struct RecoveryExecutor {
    config: RecoveryConfig,
    sink: Arc<dyn EscalationSink>,
}

impl RecoveryExecutor {
    pub fn new(sink: Arc<dyn EscalationSink>) -> Self {
        Self::with_config(sink, RecoveryConfig::default())
    }

    pub fn with_config(sink: Arc<dyn EscalationSink>, config: RecoveryConfig) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Apply an action. Never fails: delivery problems are reported in the outcome.
    pub async fn apply(
        &self,
        action: RecoveryAction,
        request: &RecoveryRequest<'_>,
        cancel: &CancellationToken,
    ) -> Outcome {
        match action {
            RecoveryAction::Retry { delay } => {
                debug!(operation = %request.issue.operation, delay_ms = delay.as_millis() as u64, "backing off");
                if !wait(delay, cancel).await {
                    return Outcome::Abandoned;
                }
                Outcome::retry()
            }
            RecoveryAction::Adapt { changes } => {
                if !wait(Duration::from_millis(self.config.adapt_settle_ms), cancel).await {
                    return Outcome::Abandoned;
                }
                Outcome::RetrySignal {
                    changes,
                    target: RetryTarget::Unchanged,
                }
            }
            RecoveryAction::AlternativePath { substitute } => {
                if cancel.is_cancelled() {
                    return Outcome::Abandoned;
                }
                info!(
                    operation = %request.issue.operation,
                    substitute = %substitute.id,
                    "switching to alternative"
                );
                Outcome::RetrySignal {
                    changes: Vec::new(),
                    target: RetryTarget::Substitute(substitute),
                }
            }
            RecoveryAction::Escalate { reason } => {
                Outcome::Escalated(self.escalate(reason, request).await)
            }
            RecoveryAction::Proceed { reason } => {
                info!(operation = %request.issue.operation, %reason, "proceeding past failure");
                Outcome::Resolved { reason }
            }
        }
    }

    async fn escalate(&self, reason: String, request: &RecoveryRequest<'_>) -> EscalationReceipt {
        let mut bundle = EscalationBundle::new(
            request.run_id,
            request.pipeline,
            request.issue,
            reason,
            request.history,
        );
        if let Some(analysis) = request.analysis {
            bundle = bundle.with_analysis(analysis.summary.clone());
        }

        let timeout = Duration::from_millis(self.config.escalation_timeout_ms);
        let sink = self.sink.name().to_string();

        match tokio::time::timeout(timeout, self.sink.escalate(&bundle)).await {
            Ok(Ok(acknowledgement)) => {
                info!(operation = %bundle.operation, %sink, "escalation delivered");
                EscalationReceipt {
                    delivered: true,
                    sink,
                    error: None,
                    acknowledgement: Some(acknowledgement),
                    bundle,
                }
            }
            Ok(Err(e)) => {
                warn!(operation = %bundle.operation, %sink, error = %e, "escalation delivery failed");
                EscalationReceipt {
                    delivered: false,
                    sink,
                    error: Some(e.to_string()),
                    acknowledgement: None,
                    bundle,
                }
            }
            Err(_) => {
                warn!(operation = %bundle.operation, %sink, timeout_ms = self.config.escalation_timeout_ms, "escalation delivery timed out");
                EscalationReceipt {
                    delivered: false,
                    sink,
                    error: Some(format!("timed out after {}ms", self.config.escalation_timeout_ms)),
                    acknowledgement: None,
                    bundle,
                }
            }
        }
    }
}

/// Sleep unless cancelled first; false means cancelled
async fn wait(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = cancel.cancelled() => false,
    }
}
