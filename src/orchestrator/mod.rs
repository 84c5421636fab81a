//! Pipeline orchestration
//!
//! Pipelines and phases, the run-scoped execution context, the
//! per-operation state machine and the run loop tying classifier,
//! selector and executor together.

pub mod context;
pub mod engine;
pub mod pipeline;
pub mod state;

pub use context::ExecutionContext;
pub use engine::{Orchestrator, OrchestratorBuilder};
pub use pipeline::{Phase, Pipeline};
pub use state::{OperationMachine, OperationState, StateEvent};
