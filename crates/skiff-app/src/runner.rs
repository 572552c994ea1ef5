//! Per-tenant job execution.
//!
//! # Design
//! - `JobRunner::run` never fails. Every fault is written to the tenant log
//!   and the run moves on to its next phase.
//! - Only a connection failure (including unresolvable credentials) marks the
//!   run `Failed`. Transfer, archive and retention faults still complete it.
//! - The run is blocking and sequential; schedulers call it from a blocking
//!   thread.
//! - Each tenant keeps one log stream for the life of the runner, so a
//!   subscriber sees every run, not just the one in flight.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use chrono::{Local, Utc};
use skiff_config::{Credentials, TenantConfig, TenantId, TransferDirection};
use skiff_runtime::{StatusError, StatusStore};
use skiff_sync::{
    Connector, ExtensionFilter, RemoteFs, StagingPolicy, TransferEngine, TransferOptions,
    TransferReport, archive, delete_archived, sweep,
};
use skiff_telemetry::{Metrics, TenantLog, TenantLogLine, run_span};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

const OUTCOME_SUCCESS: &str = "success";
const OUTCOME_FAILURE: &str = "failure";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every phase was attempted.
    Completed,
    /// The remote could not be reached.
    Failed,
    /// Another run for the tenant was active.
    Skipped,
}

impl RunOutcome {
    /// Label used for metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => OUTCOME_SUCCESS,
            Self::Failed => OUTCOME_FAILURE,
            Self::Skipped => "skipped",
        }
    }
}

impl Display for RunOutcome {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Tenant that ran.
    pub tenant: TenantId,
    /// Identifier tagging every log line of the run.
    pub run_id: Uuid,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Files moved successfully.
    pub transferred: usize,
    /// Files that failed to move.
    pub failed: usize,
    /// Subtrees that could not be listed.
    pub list_errors: usize,
    /// Files moved into the archive bucket.
    pub archived: usize,
    /// Archive entries removed by retention.
    pub retention_removed: u64,
}

impl RunSummary {
    fn new(tenant: TenantId, run_id: Uuid) -> Self {
        Self {
            tenant,
            run_id,
            outcome: RunOutcome::Completed,
            transferred: 0,
            failed: 0,
            list_errors: 0,
            archived: 0,
            retention_removed: 0,
        }
    }
}

/// Executes tenant jobs against shared status, metrics and log directory.
#[derive(Clone)]
pub struct JobRunner {
    connector: Arc<dyn Connector>,
    status: StatusStore,
    metrics: Metrics,
    log_dir: PathBuf,
    logs: Arc<Mutex<HashMap<TenantId, TenantLog>>>,
}

impl JobRunner {
    /// Runner writing tenant logs beneath `log_dir`.
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        status: StatusStore,
        metrics: Metrics,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            connector,
            status,
            metrics,
            log_dir: log_dir.into(),
            logs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Status store this runner updates.
    #[must_use]
    pub const fn status(&self) -> &StatusStore {
        &self.status
    }

    /// Metrics this runner updates.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Lines written to `tenant`'s log by this and every later run.
    #[must_use]
    pub fn subscribe(&self, tenant: &TenantId) -> broadcast::Receiver<TenantLogLine> {
        self.tenant_log(tenant).subscribe()
    }

    /// Run one job for `tenant`.
    ///
    /// The tenant must already be registered with the status store.
    #[must_use]
    pub fn run(&self, tenant: &TenantId, config: &TenantConfig) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = run_span(tenant.as_str(), &run_id.to_string());
        let _entered = span.enter();
        let log = self.tenant_log(tenant);
        let mut summary = RunSummary::new(tenant.clone(), run_id);

        if let Err(err) = self.status.begin_run(tenant, Utc::now()) {
            match err {
                StatusError::AlreadyRunning { .. } => {
                    log.warn("run skipped: previous run still in progress");
                }
                other => log.error(format!("run skipped: {other}")),
            }
            summary.outcome = RunOutcome::Skipped;
            return summary;
        }
        self.metrics.job_started();
        log.info(format!(
            "job started: {} via {} (run {run_id})",
            config.direction.as_str(),
            config.remote.kind()
        ));

        match self.connect(config) {
            Ok(remote) => {
                self.execute(remote.as_ref(), config, &log, &mut summary);
                drop(remote);
                log.info(format!(
                    "job completed: {} transferred, {} failed, {} archived, {} expired",
                    summary.transferred, summary.failed, summary.archived, summary.retention_removed
                ));
                self.settle(tenant, RunOutcome::Completed, None);
            }
            Err(reason) => {
                log.error(format!("job failed: {reason}"));
                summary.outcome = RunOutcome::Failed;
                self.settle(tenant, RunOutcome::Failed, Some(reason));
            }
        }
        summary
    }

    fn tenant_log(&self, tenant: &TenantId) -> TenantLog {
        if let Some(log) = self.cached_logs().get(tenant) {
            return log.clone();
        }
        let opened = TenantLog::open(&self.log_dir, tenant.as_str()).unwrap_or_else(|err| {
            warn!(
                tenant = %tenant,
                log_dir = %self.log_dir.display(),
                error = %err,
                "tenant log file unavailable; logging to the process log only"
            );
            TenantLog::detached(tenant.as_str())
        });
        self.cached_logs()
            .entry(tenant.clone())
            .or_insert(opened)
            .clone()
    }

    fn cached_logs(&self) -> MutexGuard<'_, HashMap<TenantId, TenantLog>> {
        self.logs.lock().unwrap_or_else(|poisoned| {
            warn!("tenant log cache mutex poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn connect(&self, config: &TenantConfig) -> Result<Box<dyn RemoteFs>, String> {
        let credentials = Credentials::for_endpoint(&config.remote)
            .map_err(|err| format!("credentials unavailable: {err}"))?;
        self.connector
            .connect(&config.remote, &credentials)
            .map_err(|err| err.detail())
    }

    fn execute(
        &self,
        remote: &dyn RemoteFs,
        config: &TenantConfig,
        log: &TenantLog,
        summary: &mut RunSummary,
    ) {
        let report = self.transfer_phase(remote, config, log);
        summary.transferred = report.batch.succeeded();
        summary.failed = report.batch.failed();
        summary.list_errors = report.list_errors;

        if config.direction == TransferDirection::Upload {
            summary.archived = self.archive_phase(&report, config, log);
        }
        summary.retention_removed = self.retention_phase(config, log);
    }

    fn transfer_phase(
        &self,
        remote: &dyn RemoteFs,
        config: &TenantConfig,
        log: &TenantLog,
    ) -> TransferReport {
        let filter = ExtensionFilter::new(config.extensions.iter().cloned());
        let options = TransferOptions {
            staging: config.staging.as_ref().map(|staging| StagingPolicy {
                dir: staging.path.clone(),
                rename_suffix: staging.rename_suffix.clone(),
            }),
            delete_remote_after_download: config.delete_after_transfer,
        };

        let mut engine = TransferEngine::new(remote, log, &options);
        match config.direction {
            TransferDirection::Upload => engine.upload_tree(
                &config.local_path,
                &config.remote_path,
                &filter,
                config.root_only,
            ),
            TransferDirection::Download => engine.download_tree(
                &config.remote_path,
                &config.local_path,
                &filter,
                config.root_only,
            ),
        }
        let report = engine.finish();

        for record in report.batch.records() {
            let outcome = if record.succeeded() {
                OUTCOME_SUCCESS
            } else {
                OUTCOME_FAILURE
            };
            self.metrics.inc_transfer(record.direction.as_str(), outcome);
        }
        report
    }

    fn archive_phase(
        &self,
        report: &TransferReport,
        config: &TenantConfig,
        log: &TenantLog,
    ) -> usize {
        let sources = report.batch.successful_sources();
        if sources.is_empty() {
            debug!("nothing to archive");
            return 0;
        }

        let archived = match archive(&sources, &config.archive_path, Local::now().date_naive()) {
            Ok(archived) => archived,
            Err(failure) => {
                log.error(format!("archive stopped: {}", failure.error.detail()));
                failure.partial
            }
        };
        let count = archived.archived.len();
        if count == 0 {
            return 0;
        }
        self.metrics
            .add_archived(u64::try_from(count).unwrap_or(u64::MAX));
        log.info(format!(
            "archived {count} file(s) into {}",
            archived.bucket.display()
        ));
        if archived.renamed > 0 {
            log.warn(format!(
                "{} file(s) archived under a numbered name; the bucket already held that name",
                archived.renamed
            ));
        }

        if config.delete_archived {
            match delete_archived(&archived.archived) {
                Ok(removed) => log.info(format!("deleted {removed} archived file(s)")),
                Err(err) => log.error(format!("archive cleanup stopped: {}", err.detail())),
            }
        }
        count
    }

    fn retention_phase(&self, config: &TenantConfig, log: &TenantLog) -> u64 {
        match sweep(&config.archive_path, config.retention_days, SystemTime::now()) {
            Ok(report) => {
                let removed = report.total();
                if removed > 0 {
                    log.info(format!(
                        "retention removed {} file(s) and {} dir(s) older than {} days",
                        report.removed_files, report.removed_dirs, config.retention_days
                    ));
                }
                self.metrics.add_retention_removed(removed);
                removed
            }
            Err(err) => {
                log.error(format!("retention sweep aborted: {}", err.detail()));
                0
            }
        }
    }

    fn settle(&self, tenant: &TenantId, outcome: RunOutcome, reason: Option<String>) {
        let at = Utc::now();
        let result = match reason {
            Some(reason) => self.status.fail(tenant, at, reason),
            None => self.status.complete(tenant, at),
        };
        if let Err(err) = result {
            warn!(tenant = %tenant, error = %err, "job status not updated");
        }
        self.metrics.inc_job_run(outcome.as_str());
        self.metrics.job_finished();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_config::{RemoteEndpoint, TenantRegistry, parse_registry};
    use skiff_runtime::JobPhase;
    use skiff_sync::{DirSource, ListedEntry, LocalRemote, StandardConnector, SyncError, SyncResult};
    use skiff_test_support::fixtures;
    use std::fs;
    use std::io::{self, Read, Write};
    use std::path::Path;

    fn registry(local: &Path, remote: &Path, archive: &Path) -> anyhow::Result<TenantRegistry> {
        let doc = format!(
            r#"{{
                "acme": {{
                    "remote": {{ "kind": "local", "root": {remote:?} }},
                    "local_path": {local:?},
                    "remote_path": "/inbound",
                    "archive_path": {archive:?},
                    "extensions": ["csv"]
                }}
            }}"#
        );
        Ok(parse_registry(&doc)?)
    }

    fn runner(log_dir: &Path) -> anyhow::Result<JobRunner> {
        Ok(JobRunner::new(
            Arc::new(StandardConnector),
            StatusStore::new(),
            Metrics::new()?,
            log_dir,
        ))
    }

    #[test]
    fn upload_run_transfers_archives_and_completes() -> anyhow::Result<()> {
        let temp = fixtures::temp_dir("skiff-runner-")?;
        let local = temp.path().join("in");
        let remote = temp.path().join("remote");
        let archive_root = temp.path().join("archive");
        fs::create_dir_all(&remote)?;
        fixtures::write_file(&local, "a.csv", b"alpha")?;
        fixtures::write_file(&local, "b.txt", b"beta")?;

        let registry = registry(&local, &remote, &archive_root)?;
        let (tenant, config) = registry.get("acme")?;
        let runner = runner(&temp.path().join("logs"))?;
        runner.status().register(tenant, None, Utc::now());

        let summary = runner.run(tenant, config);
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.transferred, 1);
        assert_eq!(summary.archived, 1);
        assert_eq!(fs::read(remote.join("inbound/a.csv"))?, b"alpha");
        assert!(local.join("b.txt").exists());
        assert!(!local.join("a.csv").exists());

        let status = runner
            .status()
            .get(tenant)
            .ok_or_else(|| anyhow::anyhow!("tenant status missing"))?;
        assert_eq!(status.phase, JobPhase::Completed);
        assert!(status.last_run.is_some());

        let snapshot = runner.metrics().snapshot();
        assert_eq!(snapshot.transfers_succeeded, 1);
        assert_eq!(snapshot.archived_files_total, 1);
        assert_eq!(snapshot.running_jobs, 0);

        let tenant_log = fs::read_to_string(temp.path().join("logs/acme.log"))?;
        assert!(tenant_log.contains("INFO job started"));
        assert!(tenant_log.contains("INFO job completed"));
        Ok(())
    }

    #[test]
    fn unreachable_remote_fails_the_run() -> anyhow::Result<()> {
        let temp = fixtures::temp_dir("skiff-runner-")?;
        let local = temp.path().join("in");
        fixtures::write_file(&local, "a.csv", b"alpha")?;
        let registry = registry(
            &local,
            &temp.path().join("missing-remote"),
            &temp.path().join("archive"),
        )?;
        let (tenant, config) = registry.get("acme")?;
        let runner = runner(&temp.path().join("logs"))?;
        runner.status().register(tenant, None, Utc::now());

        let summary = runner.run(tenant, config);
        assert_eq!(summary.outcome, RunOutcome::Failed);
        assert!(local.join("a.csv").exists());

        let status = runner
            .status()
            .get(tenant)
            .ok_or_else(|| anyhow::anyhow!("tenant status missing"))?;
        assert_eq!(status.phase, JobPhase::Failed);
        assert!(
            status
                .last_error
                .as_deref()
                .is_some_and(|reason| reason.contains("remote connection failed"))
        );
        Ok(())
    }

    #[test]
    fn unregistered_tenant_is_skipped() -> anyhow::Result<()> {
        let temp = fixtures::temp_dir("skiff-runner-")?;
        let registry = registry(
            &temp.path().join("in"),
            temp.path(),
            &temp.path().join("archive"),
        )?;
        let (tenant, config) = registry.get("acme")?;
        let runner = runner(&temp.path().join("logs"))?;

        let summary = runner.run(tenant, config);
        assert_eq!(summary.outcome, RunOutcome::Skipped);
        assert_eq!(runner.metrics().snapshot().running_jobs, 0);
        Ok(())
    }

    /// Local remote that deletes a local file when `trigger` is written,
    /// so the archive step finds one uploaded source gone.
    struct VanishingSource {
        local_file: PathBuf,
        trigger: &'static str,
    }

    struct VanishingRemote {
        inner: LocalRemote,
        local_file: PathBuf,
        trigger: &'static str,
    }

    impl Connector for VanishingSource {
        fn connect(
            &self,
            endpoint: &RemoteEndpoint,
            credentials: &Credentials,
        ) -> SyncResult<Box<dyn RemoteFs>> {
            let RemoteEndpoint::Local { root } = endpoint else {
                return StandardConnector.connect(endpoint, credentials);
            };
            let inner = LocalRemote::open(root).map_err(|source| SyncError::Connect {
                endpoint: root.display().to_string(),
                source,
            })?;
            Ok(Box::new(VanishingRemote {
                inner,
                local_file: self.local_file.clone(),
                trigger: self.trigger,
            }))
        }
    }

    impl DirSource for VanishingRemote {
        fn list_dir(&self, path: &Path) -> io::Result<Vec<ListedEntry>> {
            self.inner.list_dir(path)
        }
    }

    impl RemoteFs for VanishingRemote {
        fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>> {
            self.inner.open_read(path)
        }
        fn create_write(&self, path: &Path) -> io::Result<Box<dyn Write>> {
            if path.file_name().is_some_and(|name| name == self.trigger) {
                fs::remove_file(&self.local_file)?;
            }
            self.inner.create_write(path)
        }
        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            self.inner.rename(from, to)
        }
        fn remove(&self, path: &Path) -> io::Result<()> {
            self.inner.remove(path)
        }
        fn make_dir_recursive(&self, path: &Path) -> io::Result<()> {
            self.inner.make_dir_recursive(path)
        }
    }

    #[test]
    fn stopped_archive_still_counts_and_cleans_what_it_moved() -> anyhow::Result<()> {
        let temp = fixtures::temp_dir("skiff-runner-")?;
        let local = temp.path().join("in");
        let remote = temp.path().join("remote");
        let archive_root = temp.path().join("archive");
        fs::create_dir_all(&remote)?;
        for name in ["a.csv", "b.csv", "c.csv"] {
            fixtures::write_file(&local, name, name.as_bytes())?;
        }
        let doc = format!(
            r#"{{
                "acme": {{
                    "remote": {{ "kind": "local", "root": {remote:?} }},
                    "local_path": {local:?},
                    "remote_path": "/inbound",
                    "archive_path": {archive_root:?},
                    "delete_archived": true
                }}
            }}"#
        );
        let registry = parse_registry(&doc)?;
        let (tenant, config) = registry.get("acme")?;
        let runner = JobRunner::new(
            Arc::new(VanishingSource {
                local_file: local.join("b.csv"),
                trigger: "c.csv",
            }),
            StatusStore::new(),
            Metrics::new()?,
            temp.path().join("logs"),
        );
        runner.status().register(tenant, None, Utc::now());

        let summary = runner.run(tenant, config);
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.transferred, 3);
        assert_eq!(summary.archived, 1);
        assert_eq!(runner.metrics().snapshot().archived_files_total, 1);

        let bucket = skiff_sync::bucket_for(&archive_root, Local::now().date_naive());
        assert!(bucket.is_dir());
        assert!(!bucket.join("a.csv").exists());
        assert!(!local.join("a.csv").exists());
        assert!(local.join("c.csv").exists());

        let tenant_log = fs::read_to_string(temp.path().join("logs/acme.log"))?;
        assert!(tenant_log.contains("ERROR archive stopped"));
        assert!(tenant_log.contains("INFO archived 1 file(s)"));
        assert!(tenant_log.contains("INFO deleted 1 archived file(s)"));
        Ok(())
    }

    #[test]
    fn subscriber_sees_every_run_of_its_tenant() -> anyhow::Result<()> {
        let temp = fixtures::temp_dir("skiff-runner-")?;
        let local = temp.path().join("in");
        let remote = temp.path().join("remote");
        fs::create_dir_all(&remote)?;
        fs::create_dir_all(&local)?;
        let registry = registry(&local, &remote, &temp.path().join("archive"))?;
        let (tenant, config) = registry.get("acme")?;
        let runner = runner(&temp.path().join("logs"))?;
        runner.status().register(tenant, None, Utc::now());

        let mut lines = runner.subscribe(tenant);
        let first = runner.run(tenant, config);
        let second = runner.run(tenant, config);

        let mut started = Vec::new();
        while let Ok(line) = lines.try_recv() {
            if line.message.starts_with("job started") {
                started.push(line.message);
            }
        }
        assert_eq!(started.len(), 2);
        assert!(started[0].contains(&first.run_id.to_string()));
        assert!(started[1].contains(&second.run_id.to_string()));
        Ok(())
    }
}
