//! Command-line argument parsing for autoheal
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use crate::errors::{OrchestratorError, Result};
use crate::types::{ParamValue, Parameters};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// autoheal - run command pipelines that recover from their own failures
#[derive(Parser, Debug)]
#[command(name = "autoheal")]
#[command(version)]
#[command(about = "Run command pipelines with failure classification and automatic recovery", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (warnings and the final summary only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline
    Run {
        /// Pipeline definition (TOML)
        #[arg(value_name = "PIPELINE")]
        pipeline: PathBuf,

        /// Directory for per-attempt command logs
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Write the run report to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Report file format
        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,

        /// Parameter override, repeatable (key=value)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Check a pipeline definition without running it
    Validate {
        /// Pipeline definition (TOML)
        #[arg(value_name = "PIPELINE")]
        pipeline: PathBuf,
    },

    /// Display current configuration
    Config,
}

/// Report file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Text,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags; `fallback` applies when no flag is given
    pub fn verbosity(&self, fallback: Verbosity) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => fallback,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

/// Parse `key=value` pairs; numeric values become numbers
pub fn parse_params(pairs: &[String]) -> Result<Parameters> {
    let mut params = Parameters::new();

    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            OrchestratorError::ConfigError(format!("Parameter '{}' is not in key=value form", pair))
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(OrchestratorError::ConfigError(format!(
                "Parameter '{}' has an empty key",
                pair
            )));
        }

        let value = match value.trim().parse::<u64>() {
            Ok(n) => ParamValue::Number(n),
            Err(_) => ParamValue::Text(value.to_string()),
        };
        params.insert(key.to_string(), value);
    }

    Ok(params)
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Check if should print the run summary
    pub fn show_summary(&self) -> bool {
        true
    }

    /// Check if should list every operation, not just the failed ones
    pub fn show_all_operations(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}

impl FromStr for Verbosity {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" => Ok(Verbosity::Quiet),
            "normal" => Ok(Verbosity::Normal),
            "verbose" => Ok(Verbosity::Verbose),
            "very_verbose" | "very-verbose" => Ok(Verbosity::VeryVerbose),
            other => Err(OrchestratorError::ConfigError(format!("Unknown verbosity: {}", other))),
        }
    }
}
