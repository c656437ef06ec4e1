use crate::archive::{self, BackupPlan, CreatedArchive};
use crate::checksum;
use crate::config::Config;
use crate::lock::LockGuard;
use crate::notify::{EventLog, FileNotifier, Notifier, Outcome};
use crate::restore::{self, RestoreSummary};
use crate::retention::{self, RetentionPolicy, RotationReport};
use crate::store::{self, ArchiveEntry, Store};
use crate::{Error, Result};
use chrono::{Local, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of a backup invocation.
#[derive(Debug)]
pub enum RunOutcome {
    /// Dry run: nothing was written.
    Planned(BackupPlan),
    /// A verified archive was produced and rotation ran.
    Completed {
        archive: CreatedArchive,
        digest: String,
        rotation: RotationReport,
    },
}

/// Drives the backup lifecycle: lock, create, verify, rotate.
///
/// The lock is held for the whole run and released on every exit path.
/// Restore, list and verify are independent entry points that bypass
/// creation and rotation and never take the lock.
pub struct BackupLifecycle {
    config: Config,
    store: Store,
    notifier: Arc<dyn Notifier>,
    log: EventLog,
}

impl BackupLifecycle {
    pub fn new(config: Config) -> Self {
        let store = Store::new(&config.destination);
        let notifier = Arc::new(FileNotifier::new(config.notify_path()));
        let log = EventLog::new(config.log_path());
        Self {
            config,
            store,
            notifier,
            log,
        }
    }

    /// Replace the notification sink.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            daily_keep: self.config.daily_keep,
            weekly_keep: self.config.weekly_keep,
            monthly_keep: self.config.monthly_keep,
        }
    }

    /// Run the full lifecycle against `source`. The archive is named from
    /// the current local time at minute granularity.
    ///
    /// A dry run reports the intended action without acquiring the lock or
    /// writing anything, and emits no notification.
    pub async fn run(&self, source: &Path, dry_run: bool, extra_excludes: &[String]) -> Result<RunOutcome> {
        let name = store::archive_name(Local::now());
        self.run_named(source, dry_run, extra_excludes, &name).await
    }

    async fn run_named(
        &self,
        source: &Path,
        dry_run: bool,
        extra_excludes: &[String],
        name: &str,
    ) -> Result<RunOutcome> {
        let mut excludes = self.config.exclude_patterns();
        excludes.extend(extra_excludes.iter().cloned());

        if dry_run {
            let plan = archive::plan_backup(source, &self.store, name, &excludes).await?;
            info!(
                "Dry run: would create {} archive {} ({} files, {} bytes)",
                if plan.full { "full" } else { "incremental" },
                plan.name,
                plan.file_count,
                plan.total_bytes
            );
            return Ok(RunOutcome::Planned(plan));
        }

        self.store.ensure().await?;
        let _lock = LockGuard::acquire(&self.store.lock_path())?;
        self.log
            .append(&format!("run started for {}", source.display()))
            .await?;

        let created = match archive::create_archive(source, &self.store, name, &excludes).await {
            Ok(created) => created,
            Err(err) => return Err(self.fail(err).await),
        };
        self.log
            .append(&format!(
                "created {} archive {} ({} files)",
                if created.full { "full" } else { "incremental" },
                created.name,
                created.file_count
            ))
            .await?;

        let digest = match checksum::write_record(&created.path).await {
            Ok(digest) => digest,
            Err(err) => return Err(self.fail(err).await),
        };
        if let Err(err) = checksum::verify(&created.path).await {
            return Err(self.fail(err).await);
        }
        info!("Verified archive {} ({})", created.name, digest);
        self.notify(Outcome::Success, &format!("backup {} verified", created.name))
            .await;
        self.log.append(&format!("verified {}", created.name)).await?;

        let rotation = match retention::rotate(&self.store, self.policy(), Utc::now()).await {
            Ok(report) => report,
            Err(err) => return Err(self.fail(err).await),
        };
        self.log
            .append(&format!(
                "rotation kept {} archives, deleted {}",
                rotation.kept,
                rotation.deleted.len()
            ))
            .await?;

        Ok(RunOutcome::Completed {
            archive: created,
            digest,
            rotation,
        })
    }

    /// Extract a named archive into `target`.
    pub async fn restore(&self, name: &str, target: &Path) -> Result<RestoreSummary> {
        restore::restore_archive(&self.store, name, target).await
    }

    /// Enumerate archives at the destination, newest first.
    pub async fn list(&self) -> Result<Vec<ArchiveEntry>> {
        self.store.list_archives().await
    }

    /// Re-check an existing archive against its fingerprint record and
    /// return the stored digest.
    pub async fn verify(&self, name: &str) -> Result<String> {
        let entry = self
            .store
            .find_archive(name)
            .await?
            .ok_or_else(|| Error::BackupNotFound {
                name: name.to_string(),
            })?;
        checksum::verify(&entry.path).await?;
        checksum::read_record(&entry.path).await
    }

    async fn fail(&self, err: Error) -> Error {
        error!("Backup run failed: {}", err);
        if let Err(log_err) = self.log.append(&format!("run failed: {}", err)).await {
            error!("Could not write event log: {}", log_err);
        }
        self.notify(Outcome::Failure, &err.to_string()).await;
        err
    }

    async fn notify(&self, outcome: Outcome, message: &str) {
        if let Err(err) = self.notifier.notify(outcome, message).await {
            error!("Notification failed: {}", err);
        }
    }
}
