use crate::{store, Error, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Compute the hex-encoded SHA-256 digest of a file, streamed.
pub fn compute(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Write the fingerprint record for a freshly created archive.
///
/// The record is a `sha256sum`-compatible line next to the archive:
/// `<hex digest>  <file name>`.
pub async fn write_record(archive: &Path) -> Result<String> {
    let digest = compute(archive).map_err(|e| Error::ChecksumWriteFailed(e.to_string()))?;
    let line = format!("{}  {}\n", digest, archive_label(archive));

    let record = store::checksum_path(archive);
    fs::write(&record, line)
        .await
        .map_err(|e| Error::ChecksumWriteFailed(e.to_string()))?;

    debug!("Wrote checksum record {}", record.display());
    Ok(digest)
}

/// Read the stored digest back from the record file.
pub async fn read_record(archive: &Path) -> Result<String> {
    let record = store::checksum_path(archive);
    let raw = fs::read_to_string(&record).await?;
    raw.split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| Error::ChecksumMismatch {
            archive: archive_label(archive),
        })
}

/// Independently recompute the archive's digest and compare it against the
/// stored record. This second pass catches write-path corruption a single
/// computation cannot see.
pub async fn verify(archive: &Path) -> Result<()> {
    let stored = read_record(archive).await?;
    let actual = compute(archive)?;

    if stored != actual {
        return Err(Error::ChecksumMismatch {
            archive: archive_label(archive),
        });
    }
    Ok(())
}

fn archive_label(archive: &Path) -> String {
    archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| archive.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_matches_recomputation() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("backup-2026-08-06-1200.tar.gz");
        std::fs::write(&archive, b"archive bytes").unwrap();

        let digest = write_record(&archive).await.unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(read_record(&archive).await.unwrap(), digest);
        verify(&archive).await.unwrap();
    }

    #[tokio::test]
    async fn record_is_sha256sum_compatible() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("backup-2026-08-06-1200.tar.gz");
        std::fs::write(&archive, b"archive bytes").unwrap();

        let digest = write_record(&archive).await.unwrap();
        let raw = std::fs::read_to_string(store::checksum_path(&archive)).unwrap();
        assert_eq!(
            raw,
            format!("{}  backup-2026-08-06-1200.tar.gz\n", digest)
        );
    }

    #[tokio::test]
    async fn corrupting_one_byte_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("backup-2026-08-06-1200.tar.gz");
        std::fs::write(&archive, b"archive bytes").unwrap();
        write_record(&archive).await.unwrap();

        let mut bytes = std::fs::read(&archive).unwrap();
        bytes[0] ^= 0x01;
        std::fs::write(&archive, bytes).unwrap();

        let err = verify(&archive).await.unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn missing_record_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("backup-2026-08-06-1200.tar.gz");
        std::fs::write(&archive, b"archive bytes").unwrap();

        let err = verify(&archive).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
