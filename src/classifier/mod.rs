//! Failure classification
//!
//! Maps a failed attempt's exit status and captured output to an `Issue`
//! with a kind and severity. Classification is a pure read: it never fails
//! and never mutates run state.

pub mod rules;
pub mod types;

pub use rules::{ClassifierConfig, IssueClassifier};
pub use types::{Issue, IssueContext, IssueKind, OperationContext, Severity};
