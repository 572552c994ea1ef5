//! Staged upload protocol.
//!
//! # Design
//! - Content is written under its original name inside the staging directory,
//!   then renamed to the configured suffix there. The swapped name is the
//!   signal that the bytes are complete.
//! - The swapped file is then placed in the destination directory under its
//!   swapped name. When the destination directory is the staging directory
//!   this step is a no-op.
//! - A failed write removes the partial staged file. A failed rename leaves a
//!   complete but misnamed file in staging; it is reported, never retried.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteFs;
use crate::transfer::{StagingPolicy, write_remote};

/// Step of the staged publish that an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    /// Writing the content into the staging directory.
    Staging,
    /// Renaming the staged file to the publish suffix.
    ExtensionSwap,
    /// Moving the swapped file to its final directory.
    FinalPlacement,
}

impl PublishStage {
    /// Stable label for logs and error details.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::ExtensionSwap => "extension_swap",
            Self::FinalPlacement => "final_placement",
        }
    }
}

/// Paths produced by a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Where the content was first written.
    pub staged: PathBuf,
    /// Staged file after the suffix swap.
    pub swapped: PathBuf,
    /// Visible artifact.
    pub final_path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// Publish `local` to the directory of `destination` through `staging`.
///
/// # Errors
///
/// Returns [`SyncError::InvalidInput`] when `destination` has no file name and
/// [`SyncError::Publish`] naming the failed step otherwise.
pub fn publish(
    remote: &dyn RemoteFs,
    local: &Path,
    destination: &Path,
    staging: &StagingPolicy,
) -> SyncResult<Published> {
    let Some(file_name) = destination.file_name() else {
        return Err(SyncError::InvalidInput {
            field: "destination",
            reason: "must name a file",
            value: Some(destination.display().to_string()),
        });
    };

    remote
        .make_dir_recursive(&staging.dir)
        .map_err(|source| SyncError::publish(PublishStage::Staging, &staging.dir, source))?;
    let staged = staging.dir.join(file_name);
    let bytes = write_remote(remote, local, &staged)
        .map_err(|source| SyncError::publish(PublishStage::Staging, &staged, source))?;

    let swapped = staging.dir.join(swapped_name(destination, &staging.rename_suffix));
    remote
        .rename(&staged, &swapped)
        .map_err(|source| SyncError::publish(PublishStage::ExtensionSwap, &staged, source))?;

    let final_dir = destination.parent().unwrap_or_else(|| Path::new(""));
    let final_path = final_dir.join(swapped.file_name().unwrap_or(file_name));
    if final_path != swapped {
        remote
            .make_dir_recursive(final_dir)
            .and_then(|()| remote.rename(&swapped, &final_path))
            .map_err(|source| SyncError::publish(PublishStage::FinalPlacement, &swapped, source))?;
    }
    debug!(
        staged = %staged.display(),
        final_path = %final_path.display(),
        bytes,
        "staged publish complete"
    );

    Ok(Published {
        staged,
        swapped,
        final_path,
        bytes,
    })
}

/// `report.tmp` with suffix `.done` becomes `report.done`.
fn swapped_name(path: &Path, suffix: &str) -> OsString {
    let mut name = path
        .file_stem()
        .map_or_else(OsString::new, ToOwned::to_owned);
    name.push(suffix);
    name
}
