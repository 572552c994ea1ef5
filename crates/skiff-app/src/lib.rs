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

//! Skiff application wiring.
//!
//! Layout: `bootstrap.rs` (command dispatch and dependency wiring), `cli.rs`
//! (argument parsing), `runner.rs` (one tenant job), `scheduler.rs`
//! (schedule-driven triggering).

/// Application bootstrap and command dispatch.
pub mod bootstrap;
/// Command-line arguments.
pub mod cli;
/// Application error type.
pub mod error;
/// Per-tenant job execution.
pub mod runner;
/// Per-tenant schedule loops.
pub mod scheduler;

pub use bootstrap::{run_app, run_cli};
pub use cli::{Cli, Command};
pub use error::{AppError, AppResult};
pub use runner::{JobRunner, RunOutcome, RunSummary};
pub use scheduler::{Scheduler, SchedulerHandle, TriggerOutcome};
