//! External failure analysis
//!
//! An analysis provider gets the issue, its attempt history and the current
//! parameters, and returns a free-text summary with structured
//! recommendations and a confidence score. The selector only follows a
//! recommendation above the configured confidence threshold and within the
//! usual attempt limits.

use crate::classifier::{Issue, Severity};
use crate::errors::{OrchestratorError, Result};
use crate::history::AttemptRecord;
use crate::types::{ParameterChange, Parameters};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default confidence required to follow a recommendation
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Default analysis request timeout (10 seconds)
pub const DEFAULT_ANALYSIS_TIMEOUT_MS: u64 = 10_000;

/// Input handed to an analysis provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub issue: Issue,
    pub history: Vec<AttemptRecord>,
    pub parameters: Parameters,
}

/// Structured recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Recommendation {
    Retry,
    Adapt { changes: Vec<ParameterChange> },
    UseAlternative,
    Proceed,
    Escalate,
}

/// Provider response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,

    #[serde(default)]
    pub recommendations: Vec<Recommendation>,

    /// 0.0 to 1.0
    pub confidence: f64,
}

impl Analysis {
    pub fn is_confident(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

/// When and how analysis is consulted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// HTTP endpoint of the analysis service; none disables analysis
    pub endpoint: Option<String>,

    pub confidence_threshold: f64,

    /// Only issues at or above this severity are analysed
    pub min_severity: Severity,

    pub timeout_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            min_severity: Severity::High,
            timeout_ms: DEFAULT_ANALYSIS_TIMEOUT_MS,
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn applies_to(&self, issue: &Issue) -> bool {
        issue.severity >= self.min_severity
    }
}

/// Capability that explains a failure
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis>;
}

/// Provider backed by an HTTP service: POSTs the request, expects an `Analysis`
#[derive(Debug, Clone)]
pub struct HttpAnalysisProvider {
    client: Client,
    endpoint: String,
}

impl HttpAnalysisProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OrchestratorError::HttpError)?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl AnalysisProvider for HttpAnalysisProvider {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| OrchestratorError::AnalysisError(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::AnalysisError(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let mut analysis: Analysis = response
            .json()
            .await
            .map_err(|e| OrchestratorError::AnalysisError(format!("Failed to parse analysis: {}", e)))?;
        analysis.confidence = analysis.confidence.clamp(0.0, 1.0);

        Ok(analysis)
    }
}
