use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use skiff_config::{CredentialCipher, TenantRegistry, load_registry};
use skiff_runtime::StatusStore;
use skiff_sync::{Connector, StandardConnector};
use skiff_telemetry::{
    DEFAULT_LOG_LEVEL, GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging,
};
use tracing::info;

use crate::cli::{Cli, Command};
use crate::error::{AppError, AppResult};
use crate::runner::{JobRunner, RunSummary};
use crate::scheduler::Scheduler;

/// Dependencies required by the job-running commands.
pub(crate) struct BootstrapDependencies {
    registry: TenantRegistry,
    runner: Arc<JobRunner>,
}

impl BootstrapDependencies {
    /// Load the tenant registry and build the shared runner.
    pub(crate) fn load(
        config_path: &Path,
        log_dir: PathBuf,
        connector: Arc<dyn Connector>,
    ) -> AppResult<Self> {
        let registry =
            load_registry(config_path).map_err(|err| AppError::config("registry.load", err))?;
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let runner = Arc::new(JobRunner::new(
            connector,
            StatusStore::new(),
            metrics,
            log_dir,
        ));
        info!(
            config = %config_path.display(),
            tenants = registry.len(),
            "tenant registry loaded"
        );
        Ok(Self { registry, runner })
    }
}

/// Entry point for the `skiff` binary: parse arguments and dispatch.
///
/// # Errors
///
/// Returns an error if logging, configuration loading or signal handling
/// fails. Job failures are recorded per tenant and never returned here.
pub async fn run_app() -> AppResult<()> {
    run_cli(Cli::parse()).await
}

/// Dispatch already-parsed arguments.
///
/// # Errors
///
/// See [`run_app`].
pub async fn run_cli(cli: Cli) -> AppResult<()> {
    let label = cli.command.label();
    let Cli {
        config,
        log_dir,
        log_format,
        command,
    } = cli;
    let single_tenant = match command {
        Command::EncryptSecret { value } => return encrypt_secret(&value),
        Command::Run { tenant } => Some(tenant),
        Command::Serve => None,
    };

    let build_sha = option_env!("SKIFF_BUILD_SHA").unwrap_or("dev");
    init_logging(&LoggingConfig {
        level: DEFAULT_LOG_LEVEL,
        format: log_format.unwrap_or_else(LogFormat::infer),
        build_sha,
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(label);
    info!("skiff starting");

    let dependencies = BootstrapDependencies::load(&config, log_dir, Arc::new(StandardConnector))?;
    match single_tenant {
        Some(tenant) => run_once(dependencies, &tenant).await.map(|_| ()),
        None => serve(dependencies).await,
    }
}

/// Run one tenant immediately on a blocking thread.
pub(crate) async fn run_once(
    dependencies: BootstrapDependencies,
    tenant: &str,
) -> AppResult<RunSummary> {
    let BootstrapDependencies { registry, runner } = dependencies;
    let (tenant, config) = registry
        .get(tenant)
        .map_err(|err| AppError::config("registry.get", err))?;
    let now = Utc::now();
    runner
        .status()
        .register(tenant, config.schedule.next_after(now), now);

    let tenant = tenant.clone();
    let config = config.clone();
    let summary = tokio::task::spawn_blocking(move || runner.run(&tenant, &config))
        .await
        .map_err(|err| AppError::join("runner.run", err))?;
    info!(
        tenant = %summary.tenant,
        run_id = %summary.run_id,
        outcome = %summary.outcome,
        transferred = summary.transferred,
        failed = summary.failed,
        archived = summary.archived,
        retention_removed = summary.retention_removed,
        "single run finished"
    );
    Ok(summary)
}

async fn serve(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies { registry, runner } = dependencies;
    let handle = Scheduler::new(Arc::clone(&runner), registry).start();
    info!(tenants = handle.tenants(), "scheduler running; press Ctrl-C to stop");

    let signal = tokio::signal::ctrl_c().await;
    info!("shutdown requested; waiting for in-flight runs");
    let stopped = handle.shutdown().await;

    let snapshot = runner.metrics().snapshot();
    info!(
        transfers_succeeded = snapshot.transfers_succeeded,
        transfers_failed = snapshot.transfers_failed,
        archived_files = snapshot.archived_files_total,
        retention_removed = snapshot.retention_removed_total,
        "final metrics"
    );

    signal.map_err(|source| AppError::Io {
        operation: "signal.ctrl_c",
        path: None,
        source,
    })?;
    stopped
}

fn encrypt_secret(value: &str) -> AppResult<()> {
    let cipher =
        CredentialCipher::from_env().map_err(|err| AppError::config("credential_key", err))?;
    println!("{}", cipher.encrypt(value));
    Ok(())
}
