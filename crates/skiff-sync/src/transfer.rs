//! Single-file and tree transfers.
//!
//! # Design
//! - Every attempted file produces exactly one [`TransferRecord`], appended
//!   after the attempt finishes. A success record means every byte reached
//!   the final destination.
//! - File-level failures are logged to the tenant stream and recorded; they
//!   never stop the walk.
//! - Handles are scoped to the copy helpers, so both ends are released on
//!   every exit path. A partially written destination is removed.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use skiff_config::TransferDirection;
use skiff_telemetry::TenantLog;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::model::{TransferBatch, TransferOutcome, TransferRecord, TransferReport};
use crate::publish::publish;
use crate::remote::{DirSource, LocalDir, RemoteFs};
use crate::walker::{ExtensionFilter, TreeWalker};

/// Staging directory and publish suffix for uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingPolicy {
    /// Remote directory content is written into before publishing.
    pub dir: PathBuf,
    /// Extension (with leading dot) applied when content is complete.
    pub rename_suffix: String,
}

/// Per-run transfer behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Publish uploads through staging when set.
    pub staging: Option<StagingPolicy>,
    /// Remove the remote source after a completed download.
    pub delete_remote_after_download: bool,
}

/// Moves files for one run and accumulates the run's records.
pub struct TransferEngine<'a> {
    remote: &'a dyn RemoteFs,
    log: &'a TenantLog,
    options: &'a TransferOptions,
    batch: TransferBatch,
    list_errors: usize,
}

impl<'a> TransferEngine<'a> {
    /// Engine bound to an open remote and the tenant's log stream.
    #[must_use]
    pub fn new(remote: &'a dyn RemoteFs, log: &'a TenantLog, options: &'a TransferOptions) -> Self {
        Self {
            remote,
            log,
            options,
            batch: TransferBatch::default(),
            list_errors: 0,
        }
    }

    /// Move one file and record the outcome.
    pub fn transfer(
        &mut self,
        direction: TransferDirection,
        local: &Path,
        remote_path: &Path,
    ) -> &TransferRecord {
        let (source, attempted) = match direction {
            TransferDirection::Upload => (local.to_path_buf(), self.upload(local, remote_path)),
            TransferDirection::Download => {
                (remote_path.to_path_buf(), self.download(remote_path, local))
            }
        };

        let (destination, outcome, bytes) = match attempted {
            Ok((destination, bytes)) => {
                self.log.info(format!(
                    "{} {} -> {} ({bytes} bytes)",
                    direction.as_str(),
                    source.display(),
                    destination.display()
                ));
                (destination, TransferOutcome::Success, bytes)
            }
            Err(err) => {
                let reason = err.detail();
                self.log.error(format!("{} failed: {reason}", direction.as_str()));
                let destination = match direction {
                    TransferDirection::Upload => remote_path.to_path_buf(),
                    TransferDirection::Download => local.to_path_buf(),
                };
                (destination, TransferOutcome::Failed { reason }, 0)
            }
        };

        self.batch.push(TransferRecord {
            source,
            destination,
            direction,
            outcome,
            bytes,
            timestamp: Utc::now(),
        });
        let records = self.batch.records();
        &records[records.len() - 1]
    }

    /// Upload every allowed file under `local_root` to the mirrored location
    /// beneath `remote_root`.
    pub fn upload_tree(
        &mut self,
        local_root: &Path,
        remote_root: &Path,
        filter: &ExtensionFilter,
        root_only: bool,
    ) {
        self.transfer_tree(
            &LocalDir,
            TransferDirection::Upload,
            local_root,
            remote_root,
            filter,
            root_only,
        );
    }

    /// Download every allowed file under `remote_root` to the mirrored
    /// location beneath `local_root`.
    pub fn download_tree(
        &mut self,
        remote_root: &Path,
        local_root: &Path,
        filter: &ExtensionFilter,
        root_only: bool,
    ) {
        let remote = self.remote;
        self.transfer_tree(
            remote,
            TransferDirection::Download,
            remote_root,
            local_root,
            filter,
            root_only,
        );
    }

    /// Records and listing failures gathered so far.
    #[must_use]
    pub fn finish(self) -> TransferReport {
        TransferReport {
            batch: self.batch,
            list_errors: self.list_errors,
        }
    }

    fn transfer_tree<S: DirSource + ?Sized>(
        &mut self,
        source: &S,
        direction: TransferDirection,
        source_root: &Path,
        target_root: &Path,
        filter: &ExtensionFilter,
        root_only: bool,
    ) {
        for entry in TreeWalker::new(source, source_root, filter.clone(), root_only) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.list_errors += 1;
                    self.log.warn(format!("listing skipped: {}", err.detail()));
                    continue;
                }
            };
            if entry.is_dir {
                continue;
            }
            let from = source_root.join(&entry.relative);
            let to = target_root.join(&entry.relative);
            match direction {
                TransferDirection::Upload => self.transfer(direction, &from, &to),
                TransferDirection::Download => self.transfer(direction, &to, &from),
            };
        }
    }

    fn upload(&self, local: &Path, remote_path: &Path) -> SyncResult<(PathBuf, u64)> {
        if let Some(staging) = &self.options.staging {
            let published = publish(self.remote, local, remote_path, staging)?;
            return Ok((published.final_path, published.bytes));
        }
        let failed = |source| SyncError::Transfer {
            direction: TransferDirection::Upload.as_str(),
            from: local.to_path_buf(),
            to: remote_path.to_path_buf(),
            source,
        };
        if let Some(parent) = remote_path.parent() {
            self.remote.make_dir_recursive(parent).map_err(failed)?;
        }
        let bytes = write_remote(self.remote, local, remote_path).map_err(failed)?;
        Ok((remote_path.to_path_buf(), bytes))
    }

    fn download(&self, remote_path: &Path, local: &Path) -> SyncResult<(PathBuf, u64)> {
        let bytes = read_remote(self.remote, remote_path, local).map_err(|source| {
            SyncError::Transfer {
                direction: TransferDirection::Download.as_str(),
                from: remote_path.to_path_buf(),
                to: local.to_path_buf(),
                source,
            }
        })?;
        if self.options.delete_remote_after_download
            && let Err(err) = self.remote.remove(remote_path)
        {
            self.log.warn(format!(
                "downloaded {} but could not remove the remote copy: {err}",
                remote_path.display()
            ));
        }
        Ok((local.to_path_buf(), bytes))
    }
}

/// Copy a local file to `destination` on the remote.
pub(crate) fn write_remote(
    remote: &dyn RemoteFs,
    local: &Path,
    destination: &Path,
) -> io::Result<u64> {
    let mut reader = File::open(local)?;
    let copied = {
        let mut writer = remote.create_write(destination)?;
        io::copy(&mut reader, &mut writer).and_then(|bytes| writer.flush().map(|()| bytes))
    };
    copied.inspect_err(|_| {
        if let Err(cleanup) = remote.remove(destination) {
            debug!(
                path = %destination.display(),
                error = %cleanup,
                "partial remote file not removed"
            );
        }
    })
}

fn read_remote(remote: &dyn RemoteFs, source: &Path, local: &Path) -> io::Result<u64> {
    let mut reader = remote.open_read(source)?;
    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent)?;
    }
    let copied = {
        let mut writer = File::create(local)?;
        io::copy(&mut reader, &mut writer).and_then(|bytes| writer.sync_all().map(|()| bytes))
    };
    copied.inspect_err(|_| {
        if let Err(cleanup) = fs::remove_file(local) {
            debug!(
                path = %local.display(),
                error = %cleanup,
                "partial local file not removed"
            );
        }
    })
}
