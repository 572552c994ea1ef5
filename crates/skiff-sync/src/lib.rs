#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(unexpected_cfgs)]
#![allow(clippy::multiple_crate_versions)]

//! One-directional, per-run directory synchronisation engine.
//!
//! Layout: `remote/` (remote filesystem capabilities and backends),
//! `walker.rs` (lazy tree enumeration), `transfer.rs` (single-file and tree
//! transfers), `publish.rs` (staged upload protocol), `archive.rs` (dated
//! archive buckets), `retention.rs` (age-based cleanup).

pub mod archive;
pub mod error;
pub mod model;
pub mod publish;
pub mod remote;
pub mod retention;
pub mod transfer;
pub mod walker;

pub use archive::{ArchiveFailure, ArchiveReport, archive, bucket_for, delete_archived};
pub use error::{SyncError, SyncResult};
pub use model::{
    ListedEntry, TransferBatch, TransferOutcome, TransferRecord, TransferReport, WalkEntry,
};
pub use publish::{PublishStage, Published, publish};
pub use remote::{Connector, DirSource, LocalDir, LocalRemote, RemoteFs, StandardConnector};
pub use retention::{SweepReport, sweep};
pub use transfer::{StagingPolicy, TransferEngine, TransferOptions};
pub use walker::{ExtensionFilter, TreeWalker};
