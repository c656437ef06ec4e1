use crate::store::Store;
use crate::{Error, Result};
use flate2::read::GzDecoder;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Outcome of a completed restore.
#[derive(Debug)]
pub struct RestoreSummary {
    pub archive: String,
    pub files: usize,
}

/// Extract the named archive into `target`, overwriting on conflict.
///
/// The target directory is created if absent. A failed extraction leaves
/// the target as-is; there is no rollback. Snapshot state, the lock and
/// fingerprint records are neither consulted nor mutated.
pub async fn restore_archive(store: &Store, name: &str, target: &Path) -> Result<RestoreSummary> {
    let entry = store
        .find_archive(name)
        .await?
        .ok_or_else(|| Error::BackupNotFound {
            name: name.to_string(),
        })?;

    if !target.exists() {
        fs::create_dir_all(target).await?;
    }

    info!("Restoring {} into {}", entry.name, target.display());
    let files = extract(&entry.path, target)?;

    Ok(RestoreSummary {
        archive: entry.name,
        files,
    })
}

fn extract(archive_path: &Path, target: &Path) -> Result<usize> {
    let file = std::fs::File::open(archive_path)
        .map_err(|e| Error::RestoreFailed(format!("open {}: {}", archive_path.display(), e)))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_overwrite(true);

    let mut count = 0;
    let entries = archive
        .entries()
        .map_err(|e| Error::RestoreFailed(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::RestoreFailed(e.to_string()))?;
        let rel = entry
            .path()
            .map_err(|e| Error::RestoreFailed(e.to_string()))?
            .to_path_buf();

        let dest = target.join(&rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::RestoreFailed(format!("create {}: {}", parent.display(), e))
            })?;
        }
        entry
            .unpack(&dest)
            .map_err(|e| Error::RestoreFailed(format!("unpack {}: {}", rel.display(), e)))?;

        debug!("Restored {}", rel.display());
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::create_archive;

    async fn archived_source(store: &Store) -> tempfile::TempDir {
        let source = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(source.path().join("sub")).unwrap();
        std::fs::write(source.path().join("a.txt"), b"alpha").unwrap();
        std::fs::write(source.path().join("sub/b.txt"), b"beta").unwrap();
        create_archive(source.path(), store, "backup-2026-08-06-0100", &[])
            .await
            .unwrap();
        source
    }

    #[tokio::test]
    async fn round_trip_restores_contents() {
        let dest = tempfile::tempdir().unwrap();
        let store = Store::new(dest.path());
        let _source = archived_source(&store).await;

        let target = tempfile::tempdir().unwrap();
        let summary = restore_archive(&store, "backup-2026-08-06-0100", target.path())
            .await
            .unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(
            std::fs::read(target.path().join("a.txt")).unwrap(),
            b"alpha"
        );
        assert_eq!(
            std::fs::read(target.path().join("sub/b.txt")).unwrap(),
            b"beta"
        );
    }

    #[tokio::test]
    async fn conflicting_files_are_overwritten() {
        let dest = tempfile::tempdir().unwrap();
        let store = Store::new(dest.path());
        let _source = archived_source(&store).await;

        let target = tempfile::tempdir().unwrap();
        std::fs::write(target.path().join("a.txt"), b"stale contents").unwrap();

        restore_archive(&store, "backup-2026-08-06-0100", target.path())
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(target.path().join("a.txt")).unwrap(),
            b"alpha"
        );
    }

    #[tokio::test]
    async fn unknown_archive_leaves_target_untouched() {
        let dest = tempfile::tempdir().unwrap();
        let store = Store::new(dest.path());

        let target = tempfile::tempdir().unwrap();
        std::fs::write(target.path().join("keep.txt"), b"keep").unwrap();

        let err = restore_archive(&store, "backup-1999-01-01-0000", target.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BackupNotFound { .. }));
        assert!(target.path().join("keep.txt").exists());
        assert_eq!(std::fs::read_dir(target.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn missing_target_directory_is_created() {
        let dest = tempfile::tempdir().unwrap();
        let store = Store::new(dest.path());
        let _source = archived_source(&store).await;

        let parent = tempfile::tempdir().unwrap();
        let target = parent.path().join("restored/here");
        restore_archive(&store, "backup-2026-08-06-0100", &target)
            .await
            .unwrap();
        assert!(target.join("a.txt").exists());
    }
}
