use crate::Result;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub const ARCHIVE_PREFIX: &str = "backup-";
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";
pub const CHECKSUM_SUFFIX: &str = ".sha256";
pub const SNAPSHOT_STATE_FILE: &str = "snapshot.json";
pub const LOCK_FILE: &str = ".dirvault.lock";

/// One archive at the destination, as enumerated from disk.
///
/// Creation time is the filesystem modification time; it is not stored
/// anywhere else.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl ArchiveEntry {
    pub fn checksum_path(&self) -> PathBuf {
        checksum_path(&self.path)
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.modified).num_days()
    }
}

/// Path of the fingerprint record sitting next to an archive.
pub fn checksum_path(archive: &Path) -> PathBuf {
    let mut os = archive.as_os_str().to_os_string();
    os.push(CHECKSUM_SUFFIX);
    PathBuf::from(os)
}

/// Derive the archive name for a run started at `at` (minute granularity).
pub fn archive_name(at: DateTime<Local>) -> String {
    format!("{}{}", ARCHIVE_PREFIX, at.format("%Y-%m-%d-%H%M"))
}

/// The destination store. Owns archive naming, enumeration and deletion;
/// everything lives flat under one directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create the destination directory if it does not exist yet.
    pub async fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", name, ARCHIVE_SUFFIX))
    }

    pub fn snapshot_state_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_STATE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Enumerate archives at the destination, newest first by name.
    /// Name order is temporal order since names embed timestamps.
    pub async fn list_archives(&self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        if !self.root.exists() {
            return Ok(entries);
        }

        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            let file_name = item.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !file_name.starts_with(ARCHIVE_PREFIX) || !file_name.ends_with(ARCHIVE_SUFFIX) {
                continue;
            }

            let name = file_name.trim_end_matches(ARCHIVE_SUFFIX).to_string();
            let metadata = item.metadata().await?;
            entries.push(ArchiveEntry {
                name,
                path: item.path(),
                size: metadata.len(),
                modified: metadata.modified()?.into(),
            });
        }

        entries.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(entries)
    }

    /// Look up one archive by name; the `.tar.gz` suffix is accepted but
    /// not required.
    pub async fn find_archive(&self, name: &str) -> Result<Option<ArchiveEntry>> {
        let name = name.trim_end_matches(ARCHIVE_SUFFIX);
        let path = self.archive_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let metadata = fs::metadata(&path).await?;
        Ok(Some(ArchiveEntry {
            name: name.to_string(),
            path,
            size: metadata.len(),
            modified: metadata.modified()?.into(),
        }))
    }

    /// Delete an archive together with its fingerprint record.
    pub async fn remove_archive(&self, entry: &ArchiveEntry) -> Result<()> {
        fs::remove_file(&entry.path).await?;

        let checksum = entry.checksum_path();
        if checksum.exists() {
            fs::remove_file(&checksum).await?;
        }

        debug!("Removed archive files for {}", entry.name);
        Ok(())
    }
}
