use crate::store::{ArchiveEntry, Store};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

/// Age boundary between the weekly and monthly tiers.
pub const MONTHLY_AGE_DAYS: i64 = 28;

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub daily_keep: usize,
    pub weekly_keep: usize,
    pub monthly_keep: usize,
}

/// Outcome of one rotation pass.
#[derive(Debug, Default)]
pub struct RotationReport {
    pub kept: usize,
    pub deleted: Vec<String>,
}

/// Compute the set of archive names that survive rotation.
///
/// Three independent tiers, unioned:
/// - daily: the `daily_keep` most recent archives by creation time, any age
/// - weekly: among archives younger than 28 days, the `weekly_keep` most
///   recent by name
/// - monthly: among archives 28 days old or older, the `monthly_keep` most
///   recent by name
///
/// Names embed timestamps, so name order is temporal order. Membership is
/// tested on exact names; tiers may overlap and the union is what matters.
pub fn keep_set(
    archives: &[ArchiveEntry],
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> HashSet<String> {
    let mut keep = HashSet::new();

    let mut by_time: Vec<&ArchiveEntry> = archives.iter().collect();
    by_time.sort_by(|a, b| b.modified.cmp(&a.modified));
    for entry in by_time.iter().take(policy.daily_keep) {
        keep.insert(entry.name.clone());
    }

    let mut weekly: Vec<&ArchiveEntry> = archives
        .iter()
        .filter(|e| e.age_days(now) < MONTHLY_AGE_DAYS)
        .collect();
    weekly.sort_by(|a, b| b.name.cmp(&a.name));
    for entry in weekly.iter().take(policy.weekly_keep) {
        keep.insert(entry.name.clone());
    }

    let mut monthly: Vec<&ArchiveEntry> = archives
        .iter()
        .filter(|e| e.age_days(now) >= MONTHLY_AGE_DAYS)
        .collect();
    monthly.sort_by(|a, b| b.name.cmp(&a.name));
    for entry in monthly.iter().take(policy.monthly_keep) {
        keep.insert(entry.name.clone());
    }

    keep
}

/// Delete every archive outside the keep set, along with its fingerprint
/// record. Tolerates an empty destination.
pub async fn rotate(
    store: &Store,
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<RotationReport> {
    let archives = store.list_archives().await?;
    if archives.is_empty() {
        debug!("No archives at destination, nothing to rotate");
        return Ok(RotationReport::default());
    }

    let keep = keep_set(&archives, policy, now);
    let mut report = RotationReport {
        kept: keep.len(),
        deleted: Vec::new(),
    };

    for entry in &archives {
        if keep.contains(&entry.name) {
            continue;
        }
        store.remove_archive(entry).await?;
        info!("Pruned archive {} (age {} days)", entry.name, entry.age_days(now));
        report.deleted.push(entry.name.clone());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::path::PathBuf;

    fn entry(now: DateTime<Utc>, days_old: i64) -> ArchiveEntry {
        let modified = now - Duration::days(days_old);
        ArchiveEntry {
            name: format!("backup-{}", modified.format("%Y-%m-%d-%H%M")),
            path: PathBuf::new(),
            size: 1,
            modified,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn tiered_example_keeps_daily_weekly_and_monthly_picks() {
        let now = fixed_now();
        let archives = vec![
            entry(now, 1),
            entry(now, 10),
            entry(now, 29),
            entry(now, 40),
        ];
        let policy = RetentionPolicy {
            daily_keep: 2,
            weekly_keep: 1,
            monthly_keep: 1,
        };

        let keep = keep_set(&archives, policy, now);

        // daily: 1d + 10d; weekly: 1d again; monthly: most recent of the
        // 28d-or-older pair, the 29d archive
        assert_eq!(keep.len(), 3);
        assert!(keep.contains(&archives[0].name));
        assert!(keep.contains(&archives[1].name));
        assert!(keep.contains(&archives[2].name));
        assert!(!keep.contains(&archives[3].name));
    }

    #[test]
    fn overlapping_tiers_collapse_in_the_union() {
        let now = fixed_now();
        let archives = vec![entry(now, 1), entry(now, 2)];
        let policy = RetentionPolicy {
            daily_keep: 2,
            weekly_keep: 2,
            monthly_keep: 2,
        };

        let keep = keep_set(&archives, policy, now);
        assert_eq!(keep.len(), 2);
    }

    #[test]
    fn small_sets_keep_everything_available() {
        let now = fixed_now();
        let archives = vec![entry(now, 3)];
        let policy = RetentionPolicy {
            daily_keep: 5,
            weekly_keep: 5,
            monthly_keep: 5,
        };

        assert_eq!(keep_set(&archives, policy, now).len(), 1);
        assert!(keep_set(&[], policy, now).is_empty());
    }

    #[test]
    fn zero_keeps_discard_everything() {
        let now = fixed_now();
        let archives = vec![entry(now, 1), entry(now, 40)];
        let policy = RetentionPolicy {
            daily_keep: 0,
            weekly_keep: 0,
            monthly_keep: 0,
        };

        assert!(keep_set(&archives, policy, now).is_empty());
    }

    #[tokio::test]
    async fn rotate_deletes_outside_keep_set_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());

        for name in [
            "backup-2026-08-01-0100",
            "backup-2026-08-02-0100",
            "backup-2026-08-03-0100",
        ] {
            let path = store.archive_path(name);
            std::fs::write(&path, b"bytes").unwrap();
            std::fs::write(crate::store::checksum_path(&path), b"digest").unwrap();
        }

        // freshly written files are all in the weekly window; keep one by name
        let policy = RetentionPolicy {
            daily_keep: 0,
            weekly_keep: 1,
            monthly_keep: 0,
        };

        let report = rotate(&store, policy, Utc::now()).await.unwrap();
        let mut deleted = report.deleted.clone();
        deleted.sort();
        assert_eq!(
            deleted,
            vec![
                "backup-2026-08-01-0100".to_string(),
                "backup-2026-08-02-0100".to_string()
            ]
        );

        let remaining = store.list_archives().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "backup-2026-08-03-0100");
        assert!(remaining[0].checksum_path().exists());

        // second pass with no new archives deletes nothing
        let second = rotate(&store, policy, Utc::now()).await.unwrap();
        assert!(second.deleted.is_empty());
        assert_eq!(store.list_archives().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_destination_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let policy = RetentionPolicy {
            daily_keep: 1,
            weekly_keep: 1,
            monthly_keep: 1,
        };

        let report = rotate(&store, policy, Utc::now()).await.unwrap();
        assert_eq!(report.kept, 0);
        assert!(report.deleted.is_empty());
    }
}
