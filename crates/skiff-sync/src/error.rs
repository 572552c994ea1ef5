//! # Design
//!
//! - Provide structured, constant-message errors for the sync engine.
//! - One variant per failure class so callers can apply the right propagation
//!   policy: connection failures end a run, file-level failures do not.
//! - Sources are chained, never formatted into the message.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::publish::PublishStage;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors produced by the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote could not be reached or rejected the login.
    #[error("remote connection failed")]
    Connect {
        /// Endpoint description (kind and address).
        endpoint: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A directory could not be enumerated.
    #[error("directory listing failed")]
    List {
        /// Directory that failed to list.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Copying a single file failed.
    #[error("file transfer failed")]
    Transfer {
        /// Direction label.
        direction: &'static str,
        /// Source path.
        from: PathBuf,
        /// Destination path.
        to: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A staged publish step failed.
    #[error("staged publish failed")]
    Publish {
        /// Step that failed.
        stage: PublishStage,
        /// Path the step was operating on.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Moving or deleting archived files failed.
    #[error("archive operation failed")]
    Archive {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Removing an aged archive entry failed.
    #[error("retention sweep failed")]
    Retention {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Traversing the archive tree failed.
    #[error("retention walk failed")]
    RetentionWalk {
        /// Archive root being swept.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Unsupported operation or endpoint kind.
    #[error("unsupported sync operation")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Optional value that triggered the unsupported error.
        value: Option<String>,
    },
    /// Input validation failures.
    #[error("invalid sync input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl SyncError {
    pub(crate) fn archive(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Archive {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn retention(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Retention {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn publish(
        stage: PublishStage,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Publish {
            stage,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn list(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::List {
            path: path.into(),
            source,
        }
    }

    /// Short label naming the failure class, used in tenant log lines.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::List { .. } => "list",
            Self::Transfer { .. } => "transfer",
            Self::Publish { .. } => "publish",
            Self::Archive { .. } => "archive",
            Self::Retention { .. } | Self::RetentionWalk { .. } => "retention",
            Self::Unsupported { .. } => "unsupported",
            Self::InvalidInput { .. } => "invalid_input",
        }
    }

    /// One-line description including context and the root cause.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Connect { endpoint, source } => format!("{self} ({endpoint}): {source}"),
            Self::List { path, source } => format!("{self} ({}): {source}", path.display()),
            Self::Transfer {
                from, to, source, ..
            } => format!("{self} ({} -> {}): {source}", from.display(), to.display()),
            Self::Publish {
                stage,
                path,
                source,
            } => format!(
                "{self} at {} ({}): {source}",
                stage.as_str(),
                path.display()
            ),
            Self::Archive {
                operation,
                path,
                source,
            }
            | Self::Retention {
                operation,
                path,
                source,
            } => format!("{self} during {operation} ({}): {source}", path.display()),
            Self::RetentionWalk { path, source } => {
                format!("{self} ({}): {source}", path.display())
            }
            Self::Unsupported { operation, value } => match value {
                Some(value) => format!("{self}: {operation} ({value})"),
                None => format!("{self}: {operation}"),
            },
            Self::InvalidInput { field, reason, .. } => format!("{self}: {field} {reason}"),
        }
    }
}
