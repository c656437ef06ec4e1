use crate::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ACQUIRE_ATTEMPTS: usize = 3;

/// Scoped mutual exclusion over a destination.
///
/// The marker file holds the owning PID. Acquisition fails fast when the
/// marker belongs to a live process; a marker left behind by a dead process
/// is reclaimed. The marker is removed when the guard drops, so release
/// happens on every exit path.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn acquire(path: &Path) -> Result<Self> {
        for _ in 0..ACQUIRE_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())?;
                    debug!("Acquired lock at {}", path.display());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    let pid = match fs::read_to_string(path) {
                        Ok(text) => text.trim().parse::<u32>().ok(),
                        // marker vanished between open and read
                        Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                        Err(err) => return Err(err.into()),
                    };

                    if let Some(pid) = pid {
                        if pid_alive(pid) {
                            return Err(Error::AlreadyRunning {
                                path: path.display().to_string(),
                            });
                        }
                    }

                    warn!(
                        "Removing stale lock at {} (owner no longer running)",
                        path.display()
                    );
                    match fs::remove_file(path) {
                        Ok(()) => continue,
                        Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                        Err(err) => return Err(err.into()),
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(Error::AlreadyRunning {
            path: path.display().to_string(),
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove lock at {}: {}", self.path.display(), err);
            }
        }
    }
}

fn pid_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_writes_pid_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".dirvault.lock");

        let guard = LockGuard::acquire(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
        drop(guard);
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".dirvault.lock");

        let _guard = LockGuard::acquire(&path).unwrap();
        let err = LockGuard::acquire(&path).unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning { .. }));
    }

    #[test]
    fn drop_releases_the_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".dirvault.lock");

        let guard = LockGuard::acquire(&path).unwrap();
        assert!(path.exists());
        drop(guard);
        assert!(!path.exists());

        let reacquired = LockGuard::acquire(&path).unwrap();
        drop(reacquired);
    }

    #[test]
    fn stale_marker_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".dirvault.lock");

        // pid far above any real pid_max, so /proc/<pid> cannot exist
        fs::write(&path, "4294967294\n").unwrap();
        let guard = LockGuard::acquire(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
        drop(guard);
    }

    #[test]
    fn garbage_marker_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".dirvault.lock");

        fs::write(&path, "not a pid").unwrap();
        let guard = LockGuard::acquire(&path).unwrap();
        drop(guard);
        assert!(!path.exists());
    }
}
