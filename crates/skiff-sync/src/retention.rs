//! Age-based cleanup of the archive tree.
//!
//! # Design
//! - Walk top-down from the archive root (the root itself is never removed).
//! - An entry whose modification time is strictly before `now - days` is
//!   removed; an aged directory goes with all of its contents and is not
//!   descended into.
//! - The first failure aborts the sweep. Removed entries stay removed, so a
//!   retry only sees what is left.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{SyncError, SyncResult};

const SECONDS_PER_DAY: u64 = 86_400;

/// Entries removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files removed individually.
    pub removed_files: u64,
    /// Directories removed with their contents.
    pub removed_dirs: u64,
}

impl SweepReport {
    /// Files and directories removed.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.removed_files + self.removed_dirs
    }
}

/// Remove archive entries older than `threshold_days` relative to `now`.
///
/// A missing archive root yields an empty report.
///
/// # Errors
///
/// Returns [`SyncError::RetentionWalk`] when traversal fails and
/// [`SyncError::Retention`] when an entry cannot be inspected or removed.
pub fn sweep(archive_root: &Path, threshold_days: u32, now: SystemTime) -> SyncResult<SweepReport> {
    let mut report = SweepReport::default();
    if !archive_root.exists() {
        return Ok(report);
    }
    let cutoff = now
        .checked_sub(Duration::from_secs(u64::from(threshold_days) * SECONDS_PER_DAY))
        .unwrap_or(UNIX_EPOCH);

    let mut walker = WalkDir::new(archive_root).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|source| SyncError::RetentionWalk {
            path: archive_root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let modified = entry
            .metadata()
            .map_err(|err| SyncError::retention("metadata", path, io::Error::from(err)))?
            .modified()
            .map_err(|err| SyncError::retention("metadata", path, err))?;
        if modified >= cutoff {
            continue;
        }

        if entry.file_type().is_dir() {
            fs::remove_dir_all(path)
                .map_err(|err| SyncError::retention("remove_dir_all", path, err))?;
            walker.skip_current_dir();
            report.removed_dirs += 1;
        } else {
            fs::remove_file(path).map_err(|err| SyncError::retention("remove_file", path, err))?;
            report.removed_files += 1;
        }
        debug!(path = %path.display(), "retention removed aged entry");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_test_support::fixtures;

    #[test]
    fn only_entries_strictly_older_than_threshold_are_removed() -> anyhow::Result<()> {
        let root = fixtures::temp_dir("skiff-retention-")?;
        let now = fixtures::whole_second_now();
        for days in [6_u64, 7, 8] {
            let file = fixtures::write_file(root.path(), &format!("age-{days}.csv"), b"x")?;
            fixtures::set_age_days(&file, days, now)?;
        }

        let report = sweep(root.path(), 7, now)?;
        assert_eq!(report.removed_files, 1);
        assert!(root.path().join("age-6.csv").exists());
        assert!(root.path().join("age-7.csv").exists());
        assert!(!root.path().join("age-8.csv").exists());
        Ok(())
    }

    #[test]
    fn aged_directory_is_removed_with_fresh_contents() -> anyhow::Result<()> {
        let root = fixtures::temp_dir("skiff-retention-")?;
        let now = fixtures::whole_second_now();
        fixtures::write_file(root.path(), "old/fresh.csv", b"x")?;
        fixtures::write_file(root.path(), "new/stale.csv", b"x")?;
        fixtures::set_age_days(&root.path().join("old"), 10, now)?;
        fixtures::set_age_days(&root.path().join("new/stale.csv"), 10, now)?;
        fixtures::set_age_days(&root.path().join("new"), 3, now)?;

        let report = sweep(root.path(), 7, now)?;
        assert_eq!(
            report,
            SweepReport {
                removed_files: 1,
                removed_dirs: 1
            }
        );
        assert_eq!(report.total(), 2);
        assert!(!root.path().join("old").exists());
        assert!(root.path().join("new").exists());
        assert!(!root.path().join("new/stale.csv").exists());
        assert!(root.path().exists());
        Ok(())
    }

    #[test]
    fn missing_root_is_an_empty_sweep() -> anyhow::Result<()> {
        let root = fixtures::temp_dir("skiff-retention-")?;
        let report = sweep(&root.path().join("absent"), 7, SystemTime::now())?;
        assert_eq!(report, SweepReport::default());
        Ok(())
    }
}
