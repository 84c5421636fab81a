//! Recovery strategy selection
//!
//! `StrategySelector::decide` is a pure, deterministic function of the
//! classified issue, the attempt count and a read-only snapshot of the
//! run context.

pub mod backoff;
pub mod selector;
pub mod types;

pub use backoff::Backoff;
pub use selector::{StrategyConfig, StrategySelector};
pub use types::{ActionKind, DecisionSnapshot, RecoveryAction};
