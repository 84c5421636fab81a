//! Error types for autoheal
//!
//! Only definition and bookkeeping failures surface as errors. Failures of the
//! commands being orchestrated are data (`ExecutionResult`) and never travel
//! through this type.

use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Operation state machine transition errors
    #[error("Invalid state transition for '{operation}' from {from} to {to}")]
    InvalidTransition {
        operation: String,
        from: String,
        to: String,
    },

    /// Pipeline definition errors
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// History append-order violations
    #[error("Attempt {attempt} for '{operation}' is not after last recorded attempt {last}")]
    AttemptOutOfOrder {
        operation: String,
        attempt: u32,
        last: u32,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Command runner errors (spawn, log capture)
    #[error("Runner error: {0}")]
    RunnerError(String),

    /// Log store errors
    #[error("Log unavailable: {0}")]
    LogUnavailable(String),

    /// Escalation sink errors
    #[error("Escalation failed: {0}")]
    EscalationError(String),

    /// Analysis provider errors
    #[error("Analysis failed: {0}")]
    AnalysisError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// TOML parse errors
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Orchestrator error: {0}")]
    Generic(String),
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Convert anyhow errors to OrchestratorError
impl From<anyhow::Error> for OrchestratorError {
    fn from(err: anyhow::Error) -> Self {
        OrchestratorError::Generic(err.to_string())
    }
}
