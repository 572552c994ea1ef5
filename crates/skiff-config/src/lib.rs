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

//! Tenant configuration for the Skiff sync engine.
//!
//! Layout: `model.rs` (validated tenant types), `loader.rs` (JSON document
//! parsing), `validate.rs` (field normalisation), `schedule.rs` (cron
//! expressions), `secrets.rs` (credential resolution and decryption).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod schedule;
pub mod secrets;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_registry, parse_registry};
pub use model::{
    RemoteEndpoint, StagingConfig, TenantConfig, TenantId, TenantRegistry, TransferDirection,
};
pub use schedule::ScheduleExpr;
pub use secrets::{CREDENTIAL_KEY_ENV, CredentialCipher, Credentials, PasswordSource};
