use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

pub const STATE_VERSION: u32 = 1;

/// Size and mtime a file had when it was last captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    pub size: u64,
    pub mtime: i64,
}

/// Persisted snapshot state enabling incremental archives.
///
/// Maps source-relative paths to their captured [`FileState`]. Absent state
/// means the next backup is a full one; the state is rebuilt from the scan
/// on every successful creation, so files deleted at the source drop out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotState {
    pub version: u32,
    pub updated: DateTime<Utc>,
    pub files: HashMap<String, FileState>,
}

impl SnapshotState {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            updated: Utc::now(),
            files: HashMap::new(),
        }
    }

    /// Load the state, or `None` when no state exists yet (first run).
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read(path).await?;
        let state = serde_json::from_slice(&raw)?;
        Ok(Some(state))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_vec_pretty(self)?;
        fs::write(path, raw).await?;
        Ok(())
    }

    /// Whether `rel` is new or has changed since it was last captured.
    pub fn is_changed(&self, rel: &str, current: FileState) -> bool {
        match self.files.get(rel) {
            Some(recorded) => *recorded != current,
            None => true,
        }
    }

    pub fn record(&mut self, rel: String, state: FileState) {
        self.files.insert(rel, state);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for SnapshotState {
    fn default() -> Self {
        Self::new()
    }
}
