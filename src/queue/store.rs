//! Snapshot persistence for the audio queue.
//!
//! The queue is persisted as one whole JSON document, loaded at process
//! start and rewritten after every mutation. Acceptable at the expected
//! scale (hundreds to low thousands of items); isolated behind `QueueStore`
//! so it can be swapped for an embedded transactional store without
//! touching queue logic.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::NarratorError;
use crate::queue::QueueItem;
use crate::storage::save_json_atomically;

pub trait QueueStore: Send + Sync {
    fn load(&self) -> Result<HashMap<String, QueueItem>, NarratorError>;
    fn save(&self, items: &HashMap<String, QueueItem>) -> Result<(), NarratorError>;
}

/// File-backed snapshot store. Writes go through temp-file + atomic rename.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QueueStore for FileStore {
    fn load(&self) -> Result<HashMap<String, QueueItem>, NarratorError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| NarratorError::Storage(format!("reading {}: {e}", self.path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| NarratorError::Storage(format!("parsing {}: {e}", self.path.display())))
    }

    fn save(&self, items: &HashMap<String, QueueItem>) -> Result<(), NarratorError> {
        if let Some(parent) = self.path.parent().filter(|p| *p != Path::new("")) {
            std::fs::create_dir_all(parent)
                .map_err(|e| NarratorError::Storage(format!("creating {}: {e}", parent.display())))?;
        }
        save_json_atomically(&self.path, items)
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, QueueItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStore for MemoryStore {
    fn load(&self) -> Result<HashMap<String, QueueItem>, NarratorError> {
        Ok(self.inner.lock().expect("store mutex poisoned").clone())
    }

    fn save(&self, items: &HashMap<String, QueueItem>) -> Result<(), NarratorError> {
        *self.inner.lock().expect("store mutex poisoned") = items.clone();
        Ok(())
    }
}
