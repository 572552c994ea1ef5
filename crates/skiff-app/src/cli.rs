//! Command-line surface for the `skiff` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use skiff_config::defaults::DEFAULT_CONFIG_PATH;
use skiff_telemetry::LogFormat;

/// Default directory for per-tenant log files.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(
    name = "skiff",
    version,
    about = "Scheduled per-tenant file transfer with archival and retention"
)]
pub struct Cli {
    /// Tenant configuration document.
    #[arg(long, global = true, env = "SKIFF_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// Directory receiving `<tenant>.log` files.
    #[arg(long, global = true, env = "SKIFF_LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,
    /// Process log format (`json` or `pretty`); inferred from the build when absent.
    #[arg(long, global = true, env = "SKIFF_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    /// Action to perform.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one tenant's job now, bypassing its schedule, then exit.
    Run {
        /// Tenant identity from the configuration document.
        #[arg(long)]
        tenant: String,
    },
    /// Run every tenant on its schedule until interrupted.
    Serve,
    /// Encrypt a password for the `encrypted` credential form using the key
    /// in `SKIFF_CREDENTIAL_KEY`.
    EncryptSecret {
        /// Plain-text value to encrypt.
        #[arg(long)]
        value: String,
    },
}

impl Command {
    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Serve => "serve",
            Self::EncryptSecret { .. } => "encrypt-secret",
        }
    }
}
