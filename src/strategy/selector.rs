//! Strategy selector
//!
//! Maps (issue, attempt, context) to a recovery action. Rules, first match wins:
//! 1. Critical severity escalates
//! 2. A confident analysis recommendation, if permitted under limits
//! 3. Per-kind rule (see `decide_for_kind`)
//! 4. Fallback: retry once after the first attempt, otherwise escalate
//!
//! An escalation of a non-critical issue on an optional operation becomes
//! `Proceed`.

use crate::classifier::{Issue, IssueKind};
use crate::escalation::Recommendation;
use crate::history::AttemptRecord;
use crate::strategy::backoff::{Backoff, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS};
use crate::strategy::types::{DecisionSnapshot, RecoveryAction};
use crate::types::{ParamValue, ParameterBounds, ParameterChange, Parameters};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Default maximum attempts per operation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Strategy limits and adaptation knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,

    /// Backoff jitter as a fraction of the delay; 0 disables
    pub jitter_ratio: f64,

    pub allow_adaptation: bool,

    pub memory_param: String,
    pub memory_initial_mb: u64,
    pub memory_step_mb: u64,
    pub memory_max_mb: u64,

    /// Carries the timeout in effect for the failing attempt
    pub timeout_param: String,
    pub timeout_widen_factor: u64,
    pub timeout_max_secs: u64,

    /// Applied on the first configuration failure of an operation
    pub configuration_overrides: Parameters,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_ratio: 0.0,
            allow_adaptation: true,
            memory_param: "memory_limit_mb".to_string(),
            memory_initial_mb: 1024,
            memory_step_mb: 1024,
            memory_max_mb: 8192,
            timeout_param: "timeout_secs".to_string(),
            timeout_widen_factor: 2,
            timeout_max_secs: 3600,
            configuration_overrides: Parameters::new(),
        }
    }
}

impl StrategyConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::with_config(self.base_delay_ms, self.max_delay_ms).with_jitter(self.jitter_ratio)
    }

    /// Maxima adaptation must respect
    pub fn bounds(&self) -> ParameterBounds {
        ParameterBounds::new()
            .with_max(self.memory_param.clone(), self.memory_max_mb)
            .with_max(self.timeout_param.clone(), self.timeout_max_secs)
    }
}

/// Deterministic recovery strategy selector
#[derive(Debug, Clone)]
pub struct StrategySelector {
    config: StrategyConfig,
    backoff: Backoff,
    bounds: ParameterBounds,
    confidence_threshold: f64,
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::new(StrategyConfig::default())
    }
}

impl StrategySelector {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            backoff: config.backoff(),
            bounds: config.bounds(),
            config,
            confidence_threshold: crate::escalation::analysis::DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Confidence an analysis needs before its recommendations are followed
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    /// Choose the response to a failed attempt (1-indexed)
    pub fn decide(&self, issue: &Issue, attempt: u32, snapshot: &DecisionSnapshot<'_>) -> RecoveryAction {
        let action = self.select(issue, attempt, snapshot);

        match action {
            RecoveryAction::Escalate { reason } if snapshot.optional && !issue.is_critical() => {
                RecoveryAction::Proceed {
                    reason: format!("optional operation, {}", reason),
                }
            }
            action => action,
        }
    }

    fn select(&self, issue: &Issue, attempt: u32, snapshot: &DecisionSnapshot<'_>) -> RecoveryAction {
        if issue.is_critical() {
            return RecoveryAction::Escalate {
                reason: format!("{} severity on {}", issue.severity, issue.kind),
            };
        }

        if let Some(action) = self.follow_analysis(attempt, snapshot) {
            return action;
        }

        if let Some(action) = self.decide_for_kind(issue, attempt, snapshot) {
            return action;
        }

        if attempt == 1 && self.can_retry(attempt) {
            self.retry(attempt, snapshot)
        } else {
            RecoveryAction::Escalate {
                reason: format!("{} not resolved after {} attempt(s)", issue.kind, attempt),
            }
        }
    }

    /// Kind-specific rule; `None` falls through to the default
    fn decide_for_kind(
        &self,
        issue: &Issue,
        attempt: u32,
        snapshot: &DecisionSnapshot<'_>,
    ) -> Option<RecoveryAction> {
        match issue.kind {
            IssueKind::Timeout if self.can_retry(attempt) => Some(self.retry(attempt, snapshot)),
            IssueKind::ResourceExhaustion if self.config.allow_adaptation && self.can_retry(attempt) => {
                self.raise_memory(snapshot.parameters)
                    .map(|change| RecoveryAction::Adapt { changes: vec![change] })
            }
            IssueKind::Network => {
                if self.can_retry(attempt) {
                    Some(self.retry(attempt, snapshot))
                } else {
                    Some(self.substitute_or_escalate(snapshot, "network retries exhausted"))
                }
            }
            IssueKind::Permission => Some(self.substitute_or_escalate(
                snapshot,
                "permission denied and no alternative registered",
            )),
            IssueKind::Configuration => {
                if recurrences(issue.kind, snapshot.history) == 0
                    && self.config.allow_adaptation
                    && self.can_retry(attempt)
                {
                    Some(RecoveryAction::Adapt {
                        changes: self.configuration_remediation(snapshot.parameters),
                    })
                } else {
                    Some(RecoveryAction::Escalate {
                        reason: "configuration issue persisted after remediation".to_string(),
                    })
                }
            }
            _ => None,
        }
    }

    fn follow_analysis(&self, attempt: u32, snapshot: &DecisionSnapshot<'_>) -> Option<RecoveryAction> {
        let analysis = snapshot.analysis?;
        if !analysis.is_confident(self.confidence_threshold) {
            return None;
        }

        analysis.recommendations.iter().find_map(|recommendation| match recommendation {
            Recommendation::Retry if self.can_retry(attempt) => Some(self.retry(attempt, snapshot)),
            Recommendation::Adapt { changes }
                if self.config.allow_adaptation && self.can_retry(attempt) && !changes.is_empty() =>
            {
                Some(RecoveryAction::Adapt {
                    changes: changes.iter().map(|c| self.bounds.clamp(c)).collect(),
                })
            }
            Recommendation::UseAlternative => snapshot.alternative.map(|alternative| {
                RecoveryAction::AlternativePath {
                    substitute: Box::new(alternative.clone()),
                }
            }),
            Recommendation::Proceed if snapshot.optional => Some(RecoveryAction::Proceed {
                reason: analysis.summary.clone(),
            }),
            Recommendation::Escalate => Some(RecoveryAction::Escalate {
                reason: analysis.summary.clone(),
            }),
            _ => None,
        })
    }

    fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.config.max_attempts
    }

    fn retry(&self, attempt: u32, snapshot: &DecisionSnapshot<'_>) -> RecoveryAction {
        let mut hasher = DefaultHasher::new();
        snapshot.operation.hash(&mut hasher);

        RecoveryAction::Retry {
            delay: self.backoff.jittered_delay(attempt, hasher.finish()),
        }
    }

    fn substitute_or_escalate(&self, snapshot: &DecisionSnapshot<'_>, reason: &str) -> RecoveryAction {
        match snapshot.alternative {
            Some(alternative) => RecoveryAction::AlternativePath {
                substitute: Box::new(alternative.clone()),
            },
            None => RecoveryAction::Escalate {
                reason: reason.to_string(),
            },
        }
    }

    /// One memory step up, or `None` when already at the ceiling
    fn raise_memory(&self, parameters: &Parameters) -> Option<ParameterChange> {
        let current = numeric(parameters, &self.config.memory_param).unwrap_or(self.config.memory_initial_mb);
        let next = current
            .saturating_add(self.config.memory_step_mb)
            .min(self.config.memory_max_mb);

        (next > current).then(|| ParameterChange::set(self.config.memory_param.clone(), next))
    }

    fn configuration_remediation(&self, parameters: &Parameters) -> Vec<ParameterChange> {
        let mut changes = Vec::new();

        // Never narrows: without a known timeout there is nothing to widen
        if let Some(timeout) = numeric(parameters, &self.config.timeout_param) {
            let widened = timeout
                .saturating_mul(self.config.timeout_widen_factor)
                .min(self.config.timeout_max_secs);
            if widened > timeout {
                changes.push(ParameterChange::set(self.config.timeout_param.clone(), widened));
            }
        }

        for (key, value) in &self.config.configuration_overrides {
            if parameters.get(key) != Some(value) {
                changes.push(self.bounds.clamp(&ParameterChange::set(key.clone(), value.clone())));
            }
        }

        changes
    }

    /// Delay used for a retry after `attempt`, without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

fn numeric(parameters: &Parameters, key: &str) -> Option<u64> {
    parameters.get(key).and_then(ParamValue::as_number)
}

/// Earlier failed attempts of this operation classified as `kind`
fn recurrences(kind: IssueKind, history: &[AttemptRecord]) -> usize {
    history
        .iter()
        .filter(|record| record.issue_kind == Some(kind))
        .count()
}
