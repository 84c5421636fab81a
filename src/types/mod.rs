//! Type definitions module
//!
//! Core data model shared by every component: operations, the results of
//! running them, and the parameter overrides that adaptation produces.

pub mod operation;
pub mod execution;
pub mod parameters;

// Re-export commonly used types
pub use operation::{Operation, OperationId};
pub use execution::{ExecutionResult, ExitStatus, LogRef};
pub use parameters::{env_key, render_command, ParamValue, ParameterBounds, ParameterChange, Parameters};
