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

//! Telemetry primitives shared across the Skiff workspace.
//!
//! This crate centralises process logging, the per-tenant log stream, and
//! Prometheus metrics so the runner and scheduler report consistently.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;
pub mod tenant_log;

pub use context::{GlobalContextGuard, run_span};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
pub use tenant_log::{LogLevel, TenantLog, TenantLogLine};
