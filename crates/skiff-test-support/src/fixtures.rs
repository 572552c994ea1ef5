//! Filesystem fixtures for sync and archive tests.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

const SECONDS_PER_DAY: u64 = 86_400;

/// Create a fresh temporary directory with the given prefix.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn temp_dir(prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .context("failed to create temp dir")
}

/// Write `contents` to `root/relative`, creating parent directories.
///
/// # Errors
///
/// Returns an error if any directory or the file cannot be written.
pub fn write_file(root: &Path, relative: &str, contents: &[u8]) -> Result<PathBuf> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Backdate the modification time of `path` to `now - age`.
///
/// Works for files and directories.
///
/// # Errors
///
/// Returns an error if the entry cannot be opened or its times updated.
pub fn set_age(path: &Path, age: Duration, now: SystemTime) -> Result<()> {
    let stamp = now
        .checked_sub(age)
        .ok_or_else(|| anyhow!("age exceeds representable time"))?;
    let handle = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    handle
        .set_modified(stamp)
        .with_context(|| format!("failed to set mtime on {}", path.display()))?;
    Ok(())
}

/// Convenience wrapper for [`set_age`] with whole days.
///
/// # Errors
///
/// See [`set_age`].
pub fn set_age_days(path: &Path, days: u64, now: SystemTime) -> Result<()> {
    set_age(path, Duration::from_secs(days * SECONDS_PER_DAY), now)
}

/// Current time truncated to whole seconds, for exact threshold comparisons.
#[must_use]
pub fn whole_second_now() -> SystemTime {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_file_creates_parents() -> Result<()> {
        let temp = temp_dir("skiff-fixtures-")?;
        let path = write_file(temp.path(), "a/b/c.txt", b"hello")?;
        assert_eq!(fs::read(&path)?, b"hello");
        Ok(())
    }

    #[test]
    fn set_age_backdates_files_and_directories() -> Result<()> {
        let temp = temp_dir("skiff-fixtures-")?;
        let file = write_file(temp.path(), "dir/old.txt", b"x")?;
        let dir = temp.path().join("dir");
        let now = whole_second_now();

        set_age_days(&file, 3, now)?;
        set_age_days(&dir, 10, now)?;

        let file_age = now.duration_since(fs::metadata(&file)?.modified()?)?;
        let dir_age = now.duration_since(fs::metadata(&dir)?.modified()?)?;
        assert_eq!(file_age.as_secs(), 3 * SECONDS_PER_DAY);
        assert_eq!(dir_age.as_secs(), 10 * SECONDS_PER_DAY);
        Ok(())
    }
}
