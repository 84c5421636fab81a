//! Escalation sinks

use crate::errors::{OrchestratorError, Result};
use crate::escalation::{Acknowledgement, EscalationBundle, EscalationSink};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

/// Webhook request timeout (10 seconds)
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Sink that reports escalations through the log
#[derive(Debug, Clone, Default)]
pub struct LogEscalationSink;

impl LogEscalationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EscalationSink for LogEscalationSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn escalate(&self, bundle: &EscalationBundle) -> Result<Acknowledgement> {
        let payload = serde_json::to_string(bundle)?;
        warn!(
            run_id = %bundle.run_id,
            operation = %bundle.operation,
            phase = %bundle.phase,
            kind = %bundle.kind,
            severity = %bundle.severity,
            attempts = bundle.attempts.len(),
            %payload,
            "ESCALATION: {}",
            bundle.headline()
        );

        Ok(Acknowledgement {
            sink: self.name().to_string(),
            reference: None,
        })
    }
}

/// Sink that POSTs the bundle as JSON to a webhook
#[derive(Debug, Clone)]
pub struct WebhookEscalationSink {
    client: Client,
    url: String,
}

impl WebhookEscalationSink {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(OrchestratorError::HttpError)?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EscalationSink for WebhookEscalationSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn escalate(&self, bundle: &EscalationBundle) -> Result<Acknowledgement> {
        let response = self
            .client
            .post(&self.url)
            .json(bundle)
            .send()
            .await
            .map_err(|e| OrchestratorError::EscalationError(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OrchestratorError::EscalationError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await.unwrap_or_default();
        let reference = Some(body.trim().to_string()).filter(|s| !s.is_empty());

        Ok(Acknowledgement {
            sink: self.name().to_string(),
            reference,
        })
    }
}
