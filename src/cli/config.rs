//! Configuration management for autoheal
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.autoheal/config.toml

use crate::classifier::ClassifierConfig;
use crate::cli::args::Verbosity;
use crate::errors::{OrchestratorError, Result};
use crate::escalation::AnalysisConfig;
use crate::recovery::RecoveryConfig;
use crate::runner::logs::DEFAULT_MAX_LOG_BYTES;
use crate::strategy::StrategyConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration for autoheal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub strategy: StrategyConfig,
    pub classifier: ClassifierConfig,
    pub runner: RunnerConfig,
    pub recovery: RecoveryConfig,
    pub escalation: EscalationConfig,
    pub analysis: AnalysisConfig,
    pub paths: PathsConfig,
    pub telemetry: TelemetryConfig,
}

/// Command runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub default_timeout_secs: u64,
    pub max_log_bytes: usize,

    /// Shell used instead of the platform default
    pub shell: Option<String>,
}

/// Escalation sink configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Webhook receiving escalation bundles; the log sink is used when unset
    pub webhook_url: Option<String>,
}

/// File system paths configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub log_dir: String,

    /// JSON-lines attempt history shared across runs; none disables persistence
    pub history_file: Option<String>,
}

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub default_verbosity: String,
    pub color_output: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 3600,
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
            shell: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_dir: "~/.autoheal/logs".to_string(),
            history_file: None,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_verbosity: "normal".to_string(),
            color_output: true,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OrchestratorError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| OrchestratorError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Config::default())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".autoheal").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let strategy = &self.strategy;

        if strategy.max_attempts == 0 {
            return Err(OrchestratorError::ConfigError(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if strategy.base_delay_ms > strategy.max_delay_ms {
            return Err(OrchestratorError::ConfigError(
                "base_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&strategy.jitter_ratio) {
            return Err(OrchestratorError::ConfigError(
                "jitter_ratio must be between 0.0 and 1.0".to_string(),
            ));
        }

        if strategy.memory_initial_mb > strategy.memory_max_mb {
            return Err(OrchestratorError::ConfigError(
                "memory_initial_mb must not exceed memory_max_mb".to_string(),
            ));
        }

        if strategy.timeout_widen_factor < 1 {
            return Err(OrchestratorError::ConfigError(
                "timeout_widen_factor must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.analysis.confidence_threshold) {
            return Err(OrchestratorError::ConfigError(
                "confidence_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.runner.default_timeout_secs == 0 {
            return Err(OrchestratorError::ConfigError(
                "default_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.telemetry.default_verbosity.parse::<Verbosity>()?;

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| OrchestratorError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OrchestratorError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| OrchestratorError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Render as TOML for display
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| OrchestratorError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get log directory path
    pub fn log_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.log_dir)
    }

    /// Get history file path, if persistence is enabled
    pub fn history_file(&self) -> Option<PathBuf> {
        self.paths.history_file.as_deref().map(Self::expand_path)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.runner.default_timeout_secs)
    }

    /// Verbosity used when no flag is given
    pub fn default_verbosity(&self) -> Verbosity {
        self.telemetry
            .default_verbosity
            .parse()
            .unwrap_or(Verbosity::Normal)
    }
}
