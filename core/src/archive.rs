use crate::snapshot::{FileState, SnapshotState};
use crate::store::Store;
use crate::{Error, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One file selected by the source scan.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub rel: String,
    pub state: FileState,
}

/// Outcome of a successful archive creation.
#[derive(Debug)]
pub struct CreatedArchive {
    pub name: String,
    pub path: PathBuf,
    pub file_count: usize,
    pub total_bytes: u64,
    pub full: bool,
}

/// What a dry run would have done.
#[derive(Debug)]
pub struct BackupPlan {
    pub name: String,
    pub file_count: usize,
    pub total_bytes: u64,
    pub full: bool,
}

/// Compile exclusion patterns into a matcher over source-relative paths.
pub fn build_exclusions(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("invalid exclude pattern {:?}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| Error::Config(e.to_string()))
}

/// Recursively scan the source tree, skipping excluded paths.
/// Unreadable entries are skipped with a warning rather than failing the run.
pub fn scan_source(source: &Path, exclusions: Option<&GlobSet>) -> Result<Vec<ScannedFile>> {
    if !source.is_dir() {
        return Err(Error::SourceNotFound {
            path: source.display().to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let rel = rel.to_string_lossy().to_string();
        if let Some(set) = exclusions {
            if set.is_match(&rel) {
                debug!("Excluded {}", rel);
                continue;
            }
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!("Skipping {}: {}", rel, err);
                continue;
            }
        };
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        files.push(ScannedFile {
            path: entry.path().to_path_buf(),
            rel,
            state: FileState {
                size: metadata.len(),
                mtime,
            },
        });
    }

    Ok(files)
}

/// Free-space precondition: the destination must have room for the full
/// recursive source size. Downgraded to a warning when the figure cannot
/// be determined.
pub fn check_free_space(destination: &Path, needed: u64) -> Result<()> {
    match fs2::available_space(destination) {
        Ok(available) if available < needed => Err(Error::InsufficientSpace { needed, available }),
        Ok(available) => {
            debug!(
                "{} bytes available at destination, {} needed",
                available, needed
            );
            Ok(())
        }
        Err(err) => {
            warn!(
                "Could not determine free space at {}: {} - skipping space check",
                destination.display(),
                err
            );
            Ok(())
        }
    }
}

/// Evaluate what a backup run would do, without touching the filesystem.
pub async fn plan_backup(
    source: &Path,
    store: &Store,
    name: &str,
    excludes: &[String],
) -> Result<BackupPlan> {
    let exclusions = build_exclusions(excludes)?;
    let scanned = scan_source(source, exclusions.as_ref())?;
    let previous = SnapshotState::load(&store.snapshot_state_path()).await?;

    let (file_count, total_bytes) = match &previous {
        Some(state) => {
            let changed: Vec<&ScannedFile> = scanned
                .iter()
                .filter(|f| state.is_changed(&f.rel, f.state))
                .collect();
            (changed.len(), changed.iter().map(|f| f.state.size).sum())
        }
        None => (scanned.len(), scanned.iter().map(|f| f.state.size).sum()),
    };

    Ok(BackupPlan {
        name: name.to_string(),
        file_count,
        total_bytes,
        full: previous.is_none(),
    })
}

/// Create one archive at the destination.
///
/// With existing snapshot state the selection narrows to files whose size or
/// mtime changed since they were last captured (incremental); otherwise every
/// scanned file is captured (full) and the state is created as a side effect.
/// The state is rebuilt from the scan and saved on success.
pub async fn create_archive(
    source: &Path,
    store: &Store,
    name: &str,
    excludes: &[String],
) -> Result<CreatedArchive> {
    let exclusions = build_exclusions(excludes)?;
    let scanned = scan_source(source, exclusions.as_ref())?;

    let needed: u64 = scanned.iter().map(|f| f.state.size).sum();
    check_free_space(store.root(), needed)?;

    let state_path = store.snapshot_state_path();
    let previous = SnapshotState::load(&state_path).await?;
    let full = previous.is_none();

    let selection: Vec<&ScannedFile> = match &previous {
        Some(state) => scanned
            .iter()
            .filter(|f| state.is_changed(&f.rel, f.state))
            .collect(),
        None => scanned.iter().collect(),
    };

    let archive_path = store.archive_path(name);
    if archive_path.exists() {
        return Err(Error::ArchiveCreationFailed(format!(
            "{} already exists",
            archive_path.display()
        )));
    }

    info!(
        "Creating {} archive {} ({} files)",
        if full { "full" } else { "incremental" },
        name,
        selection.len()
    );

    if let Err(err) = write_tarball(&archive_path, &selection) {
        // do not leave a partial archive behind
        let _ = std::fs::remove_file(&archive_path);
        return Err(err);
    }

    let mut state = SnapshotState::new();
    for file in &scanned {
        state.record(file.rel.clone(), file.state);
    }
    state.save(&state_path).await?;

    let total_bytes = selection.iter().map(|f| f.state.size).sum();
    Ok(CreatedArchive {
        name: name.to_string(),
        path: archive_path,
        file_count: selection.len(),
        total_bytes,
        full,
    })
}

fn write_tarball(archive_path: &Path, selection: &[&ScannedFile]) -> Result<()> {
    let file = std::fs::File::create(archive_path).map_err(|e| {
        Error::ArchiveCreationFailed(format!("create {}: {}", archive_path.display(), e))
    })?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for scanned in selection {
        let mut src = std::fs::File::open(&scanned.path).map_err(|e| {
            Error::ArchiveCreationFailed(format!("open {}: {}", scanned.path.display(), e))
        })?;
        builder
            .append_file(Path::new(&scanned.rel), &mut src)
            .map_err(|e| Error::ArchiveCreationFailed(format!("append {}: {}", scanned.rel, e)))?;
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| {
            Error::ArchiveCreationFailed(format!("finish {}: {}", archive_path.display(), e))
        })?;
    Ok(())
}
