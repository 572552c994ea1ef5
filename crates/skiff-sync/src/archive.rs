//! Dated archive buckets for uploaded files.
//!
//! # Design
//! - One bucket per calendar day, `<root>/YYYY-MM-DD`, created lazily.
//! - Files are moved, not copied. A rename that crosses filesystems falls back
//!   to copy and remove.
//! - Bucket entries are never replaced. A name already taken in the bucket
//!   (a second run the same day, or equal basenames from different
//!   subdirectories) is archived as `<stem>-<n>.<ext>` with the lowest free `n`.
//! - Archiving stops at the first failed move. Files already in the bucket
//!   stay there and are reported with the failure; a retry treats "source
//!   gone, bucket copy present" as done.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// Outcome of archiving one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Bucket the batch was archived into.
    pub bucket: PathBuf,
    /// Bucket paths of every archived file, including ones archived by an
    /// earlier attempt.
    pub archived: Vec<PathBuf>,
    /// How many entries were found already archived.
    pub already_archived: usize,
    /// How many entries were stored under a numbered name.
    pub renamed: usize,
}

/// An archive batch that stopped early, with what it managed to move.
#[derive(Debug, Error)]
#[error("archive batch stopped")]
pub struct ArchiveFailure {
    /// Files archived before the failure.
    pub partial: ArchiveReport,
    /// The failure that stopped the batch.
    #[source]
    pub error: SyncError,
}

/// Bucket directory for `date` beneath `archive_root`.
#[must_use]
pub fn bucket_for(archive_root: &Path, date: NaiveDate) -> PathBuf {
    archive_root.join(date.format("%Y-%m-%d").to_string())
}

/// Move each of `sources` into the bucket for `date`.
///
/// Basenames are kept unless the bucket already holds that name.
///
/// # Errors
///
/// Returns an [`ArchiveFailure`] wrapping [`SyncError::Archive`] when the
/// bucket cannot be created or a file cannot be moved. Its `partial` report
/// lists the files moved before the failure; they remain archived.
pub fn archive(
    sources: &[PathBuf],
    archive_root: &Path,
    date: NaiveDate,
) -> Result<ArchiveReport, ArchiveFailure> {
    let mut report = ArchiveReport {
        bucket: bucket_for(archive_root, date),
        ..ArchiveReport::default()
    };
    match archive_into(sources, &mut report) {
        Ok(()) => Ok(report),
        Err(error) => Err(ArchiveFailure {
            partial: report,
            error,
        }),
    }
}

fn archive_into(sources: &[PathBuf], report: &mut ArchiveReport) -> SyncResult<()> {
    fs::create_dir_all(&report.bucket)
        .map_err(|source| SyncError::archive("create_bucket", &report.bucket, source))?;

    for source in sources {
        let Some(name) = source.file_name() else {
            return Err(SyncError::InvalidInput {
                field: "archive_source",
                reason: "must name a file",
                value: Some(source.display().to_string()),
            });
        };
        let target = report.bucket.join(name);
        let source_present = source.exists();
        if !source_present && target.exists() {
            debug!(path = %target.display(), "already archived");
            report.already_archived += 1;
            report.archived.push(target);
            continue;
        }
        let target = if source_present && target.exists() {
            let numbered = free_name(&report.bucket, name)
                .map_err(|err| SyncError::archive("name", &target, err))?;
            debug!(
                taken = %target.display(),
                path = %numbered.display(),
                "bucket name taken; archiving under a numbered name"
            );
            report.renamed += 1;
            numbered
        } else {
            target
        };
        move_file(source, &target).map_err(|err| SyncError::archive("move", source, err))?;
        report.archived.push(target);
    }
    Ok(())
}

/// Remove archived copies after a successful archive.
///
/// Entries that no longer exist are skipped. Returns how many files were
/// removed.
///
/// # Errors
///
/// Returns [`SyncError::Archive`] on the first removal failure.
pub fn delete_archived(archived: &[PathBuf]) -> SyncResult<usize> {
    let mut removed = 0;
    for path in archived {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(SyncError::archive("delete_archived", path, err)),
        }
    }
    Ok(removed)
}

/// First `<stem>-<n>[.<ext>]` in `bucket` that does not exist yet.
fn free_name(bucket: &Path, name: &OsStr) -> io::Result<PathBuf> {
    let path = Path::new(name);
    let stem = path.file_stem().unwrap_or(name);
    let extension = path.extension();
    for n in 1..=u32::MAX {
        let mut candidate = OsString::from(stem);
        candidate.push(format!("-{n}"));
        if let Some(extension) = extension {
            candidate.push(".");
            candidate.push(extension);
        }
        let candidate = bucket.join(candidate);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(io::Error::new(io::ErrorKind::AlreadyExists, "no free archive name"))
}

fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(source, target) {
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(source, target)?;
            fs::remove_file(source)
        }
        other => other,
    }
}
