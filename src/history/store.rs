//! Persistent history store
//!
//! JSON-lines file, one `AttemptRecord` per line, append-only. Used only as
//! the backing store of `HistoryTracker`.

use crate::errors::Result;
use crate::history::tracker::AttemptRecord;
use crate::types::OperationId;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Backing store for attempt history
pub trait HistoryStore: Send + Sync {
    fn append(&self, record: &AttemptRecord) -> Result<()>;

    /// All stored records for an operation, oldest first
    fn load(&self, operation: &OperationId) -> Result<Vec<AttemptRecord>>;
}

/// Append-only JSON-lines history file
pub struct JsonlHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistoryStore {
    /// Open a store, creating the parent directory if needed
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonlHistoryStore {
    fn append(&self, record: &AttemptRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn load(&self, operation: &OperationId) -> Result<Vec<AttemptRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AttemptRecord>(line) {
                Ok(record) if &record.operation == operation => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(line = index + 1, error = %e, "skipping corrupt history line"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::IssueKind;
    use crate::history::tracker::{AttemptOutcome, HistoryTracker};
    use crate::strategy::ActionKind;
    use crate::types::{ExecutionResult, ExitStatus};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn record(run: Uuid, op: &str, attempt: u32) -> AttemptRecord {
        let result = ExecutionResult::new(
            OperationId::from(op),
            attempt,
            ExitStatus::Code(1),
            None,
            Duration::from_millis(3),
        );
        AttemptRecord::from_result(run, &OperationId::from(op), &result, AttemptOutcome::Failed)
            .with_decision(IssueKind::Network, ActionKind::Retry)
    }

    #[test]
    fn test_append_and_load() {
        let temp = TempDir::new().unwrap();
        let store = JsonlHistoryStore::new(temp.path().join("state").join("history.jsonl")).unwrap();
        let run = Uuid::new_v4();

        store.append(&record(run, "OB01", 1)).unwrap();
        store.append(&record(run, "OB02", 1)).unwrap();
        store.append(&record(run, "OB01", 2)).unwrap();

        let loaded = store.load(&OperationId::from("OB01")).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].attempt, 2);
        assert_eq!(loaded[0].issue_kind, Some(IssueKind::Network));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let store = JsonlHistoryStore::new(temp.path().join("none.jsonl")).unwrap();
        assert!(store.load(&OperationId::from("OB01")).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.jsonl");
        let store = JsonlHistoryStore::new(&path).unwrap();
        store.append(&record(Uuid::new_v4(), "OB01", 1)).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json\n")
            .unwrap();

        assert_eq!(store.load(&OperationId::from("OB01")).unwrap().len(), 1);
    }

    #[test]
    fn test_tracker_merges_prior_runs() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(JsonlHistoryStore::new(temp.path().join("history.jsonl")).unwrap());

        let previous = Uuid::new_v4();
        store.append(&record(previous, "OB01", 1)).unwrap();

        let current = Uuid::new_v4();
        let mut tracker = HistoryTracker::new(current).with_store(store.clone());
        tracker.record(record(current, "OB01", 1)).unwrap();

        let op = OperationId::from("OB01");
        assert_eq!(tracker.query(&op, false).len(), 1);

        let all = tracker.query(&op, true);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].run_id, previous);
        assert_eq!(all[1].run_id, current);
    }
}
