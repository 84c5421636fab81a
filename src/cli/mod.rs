//! CLI module for autoheal
//!
//! Handles command-line argument parsing and configuration management.

pub mod args;
pub mod config;

pub use args::{parse_params, Args, Commands, ReportFormat, Verbosity};
pub use config::Config;
