//! Recovery execution
//! Carries out the action the selector chose and reports what happened

pub mod executor;
pub mod types;

pub use executor::{RecoveryConfig, RecoveryExecutor, RecoveryRequest};
pub use types::{EscalationReceipt, Outcome, RetryTarget};
