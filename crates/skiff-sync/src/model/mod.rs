//! Domain models for the sync engine.
//!
//! # Design
//! - Keep listing and record types lightweight and owned.
//! - Avoid embedding IO handles; callers supply references.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use skiff_config::TransferDirection;

/// One child returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    /// File or directory name, without any parent components.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Modification time when the backend reports one.
    pub modified: Option<SystemTime>,
}

/// One entry produced by the tree walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Path relative to the walk root.
    pub relative: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Modification time when the backend reports one.
    pub modified: Option<SystemTime>,
}

/// Result of moving one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The full byte stream reached its final destination.
    Success,
    /// The transfer did not complete.
    Failed {
        /// Description of the failure.
        reason: String,
    },
}

/// Record of one attempted file transfer.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    /// Where the bytes came from.
    pub source: PathBuf,
    /// Where the bytes were (or would have been) published.
    pub destination: PathBuf,
    /// Direction of the transfer.
    pub direction: TransferDirection,
    /// Success or failure.
    pub outcome: TransferOutcome,
    /// Bytes copied; zero on failure.
    pub bytes: u64,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
}

impl TransferRecord {
    /// Whether the transfer succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == TransferOutcome::Success
    }
}

/// Ordered records for one run, in the order files were attempted.
#[derive(Debug, Clone, Default)]
pub struct TransferBatch {
    records: Vec<TransferRecord>,
}

impl TransferBatch {
    pub(crate) fn push(&mut self, record: TransferRecord) {
        self.records.push(record);
    }

    /// All records in attempt order.
    #[must_use]
    pub fn records(&self) -> &[TransferRecord] {
        &self.records
    }

    /// Number of successful transfers.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.succeeded()).count()
    }

    /// Number of failed transfers.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }

    /// Source paths of the successful transfers, in order.
    #[must_use]
    pub fn successful_sources(&self) -> Vec<PathBuf> {
        self.records
            .iter()
            .filter(|r| r.succeeded())
            .map(|r| r.source.clone())
            .collect()
    }
}

/// Everything a tree transfer produced.
#[derive(Debug, Clone, Default)]
pub struct TransferReport {
    /// Per-file records.
    pub batch: TransferBatch,
    /// Subtrees that could not be listed.
    pub list_errors: usize,
}
