//! Attempt history
//!
//! Append-only record of every attempt in a run, optionally backed by a
//! persistent store so repetition signals can span runs.

pub mod store;
pub mod tracker;

pub use store::{HistoryStore, JsonlHistoryStore};
pub use tracker::{AttemptOutcome, AttemptRecord, HistoryTracker};
