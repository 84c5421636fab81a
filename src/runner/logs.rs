//! Log stores
//!
//! Resolve a `LogRef` to text for pattern matching. Reads are bounded so a
//! runaway command cannot make classification load gigabytes.

use crate::errors::{OrchestratorError, Result};
use crate::types::LogRef;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::RwLock;

/// Default read bound (2MB)
pub const DEFAULT_MAX_LOG_BYTES: usize = 2_097_152;

/// Read access to captured output
pub trait LogStore: Send + Sync {
    fn read(&self, log: &LogRef) -> Result<String>;
}

/// Logs stored as files; the reference is the file path
#[derive(Debug, Clone)]
pub struct FileLogStore {
    max_bytes: usize,
}

impl Default for FileLogStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_BYTES)
    }
}

impl FileLogStore {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl LogStore for FileLogStore {
    /// Reads at most `max_bytes` from the end of the file
    fn read(&self, log: &LogRef) -> Result<String> {
        let unavailable = |e: std::io::Error| {
            OrchestratorError::LogUnavailable(format!("{}: {}", log, e))
        };

        let mut file = File::open(log.as_str()).map_err(unavailable)?;
        let len = file.metadata().map_err(unavailable)?.len();
        if len > self.max_bytes as u64 {
            file.seek(SeekFrom::Start(len - self.max_bytes as u64))
                .map_err(unavailable)?;
        }

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(unavailable)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// In-memory log store, keyed by reference
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    logs: RwLock<HashMap<LogRef, String>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store content under a reference and return it
    pub fn insert(&self, reference: impl Into<String>, content: impl Into<String>) -> LogRef {
        let log = LogRef::new(reference);
        self.logs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(log.clone(), content.into());
        log
    }
}

impl LogStore for InMemoryLogStore {
    fn read(&self, log: &LogRef) -> Result<String> {
        self.logs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(log)
            .cloned()
            .ok_or_else(|| OrchestratorError::LogUnavailable(format!("no log stored for {}", log)))
    }
}
