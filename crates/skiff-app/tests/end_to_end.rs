//! Full job runs against a local directory standing in for the remote tree.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{Local, Utc};
use skiff_app::{JobRunner, RunOutcome};
use skiff_config::{Credentials, RemoteEndpoint, TenantRegistry, parse_registry};
use skiff_runtime::{JobPhase, StatusStore};
use skiff_sync::{Connector, RemoteFs, StandardConnector, SyncResult, bucket_for};
use skiff_telemetry::Metrics;
use skiff_test_support::fixtures;
use tempfile::TempDir;

type TestResult = anyhow::Result<()>;

/// Records the tenant's phase each time a connection is opened.
struct PhaseRecorder {
    status: StatusStore,
    seen: Mutex<Vec<JobPhase>>,
}

impl Connector for PhaseRecorder {
    fn connect(
        &self,
        endpoint: &RemoteEndpoint,
        credentials: &Credentials,
    ) -> SyncResult<Box<dyn RemoteFs>> {
        let phases: Vec<JobPhase> = self
            .status
            .snapshot()
            .values()
            .map(|status| status.phase)
            .collect();
        if let Ok(mut seen) = self.seen.lock() {
            seen.extend(phases);
        }
        StandardConnector.connect(endpoint, credentials)
    }
}

struct Sandbox {
    temp: TempDir,
}

impl Sandbox {
    fn new() -> anyhow::Result<Self> {
        let temp = fixtures::temp_dir("skiff-e2e-")?;
        fs::create_dir_all(temp.path().join("remote"))?;
        fs::create_dir_all(temp.path().join("in"))?;
        Ok(Self { temp })
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.temp.path().join(relative)
    }

    /// Registry with one tenant `acme`; `extra` is spliced into its object.
    fn registry(&self, extra: &str) -> anyhow::Result<TenantRegistry> {
        let doc = format!(
            r#"{{
                "acme": {{
                    "remote": {{ "kind": "local", "root": {remote:?} }},
                    "local_path": {local:?},
                    "archive_path": {archive:?},
                    {extra}
                }}
            }}"#,
            remote = self.path("remote"),
            local = self.path("in"),
            archive = self.path("archive"),
        );
        Ok(parse_registry(&doc)?)
    }

    fn runner(
        &self,
        connector: Arc<dyn Connector>,
        status: StatusStore,
    ) -> anyhow::Result<JobRunner> {
        Ok(JobRunner::new(
            connector,
            status,
            Metrics::new()?,
            self.path("logs"),
        ))
    }
}

#[test]
fn upload_archives_matching_files_and_walks_status_through_running() -> TestResult {
    let sandbox = Sandbox::new()?;
    fixtures::write_file(&sandbox.path("in"), "a.csv", b"alpha")?;
    fixtures::write_file(&sandbox.path("in"), "b.txt", b"beta")?;
    let registry = sandbox.registry(r#""remote_path": "/upload", "extensions": "csv""#)?;
    let (tenant, config) = registry.get("acme")?;

    let status = StatusStore::new();
    let recorder = Arc::new(PhaseRecorder {
        status: status.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let runner = sandbox.runner(recorder.clone(), status.clone())?;
    status.register(tenant, None, Utc::now());
    let before = status
        .get(tenant)
        .ok_or_else(|| anyhow::anyhow!("tenant not registered"))?;
    assert_eq!(before.phase, JobPhase::Scheduled);

    let summary = runner.run(tenant, config);
    assert_eq!(summary.outcome, RunOutcome::Completed);

    let bucket = bucket_for(&sandbox.path("archive"), Local::now().date_naive());
    assert!(bucket.join("a.csv").exists());
    assert!(!sandbox.path("in/a.csv").exists());
    assert_eq!(fs::read(sandbox.path("in/b.txt"))?, b"beta");
    assert_eq!(fs::read(sandbox.path("remote/upload/a.csv"))?, b"alpha");
    assert!(!sandbox.path("remote/upload/b.txt").exists());

    let seen = recorder
        .seen
        .lock()
        .map_err(|_| anyhow::anyhow!("recorder lock poisoned"))?
        .clone();
    assert_eq!(seen, vec![JobPhase::Running]);
    let after = status
        .get(tenant)
        .ok_or_else(|| anyhow::anyhow!("tenant status missing"))?;
    assert_eq!(after.phase, JobPhase::Completed);
    Ok(())
}

#[test]
fn staged_upload_publishes_under_the_new_extension() -> TestResult {
    let sandbox = Sandbox::new()?;
    fixtures::write_file(&sandbox.path("in"), "report.tmp", b"rows")?;
    let registry = sandbox.registry(
        r#""remote_path": "/drop", "use_staging": true, "staging_path": "/drop", "rename_suffix": ".done""#,
    )?;
    let (tenant, config) = registry.get("acme")?;
    let status = StatusStore::new();
    let runner = sandbox.runner(Arc::new(StandardConnector), status.clone())?;
    status.register(tenant, None, Utc::now());

    let summary = runner.run(tenant, config);
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.transferred, 1);

    let staging = sandbox.path("remote/drop");
    assert_eq!(fs::read(staging.join("report.done"))?, b"rows");
    assert!(!staging.join("report.tmp").exists());
    let names: Vec<String> = fs::read_dir(&staging)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    assert_eq!(names, vec!["report.done".to_string()]);
    Ok(())
}

#[test]
fn retention_removes_only_buckets_past_the_threshold() -> TestResult {
    let sandbox = Sandbox::new()?;
    let now = fixtures::whole_second_now();
    let archive = sandbox.path("archive");
    fixtures::write_file(&archive, "ten-days/old.csv", b"old")?;
    fixtures::write_file(&archive, "three-days/new.csv", b"new")?;
    for (dir, file, days) in [("ten-days", "old.csv", 10), ("three-days", "new.csv", 3)] {
        let dir = archive.join(dir);
        fixtures::set_age_days(&dir.join(file), days, now)?;
        fixtures::set_age_days(&dir, days, now)?;
    }
    let registry = sandbox.registry(r#""remote_path": "/upload", "retention_days": 7"#)?;
    let (tenant, config) = registry.get("acme")?;
    let status = StatusStore::new();
    let runner = sandbox.runner(Arc::new(StandardConnector), status.clone())?;
    status.register(tenant, None, Utc::now());

    let summary = runner.run(tenant, config);
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.retention_removed, 1);
    assert!(!archive.join("ten-days").exists());
    assert!(archive.join("three-days/new.csv").exists());
    Ok(())
}

#[test]
fn download_with_delete_clears_the_remote_and_skips_archiving() -> TestResult {
    let sandbox = Sandbox::new()?;
    fixtures::write_file(&sandbox.path("remote"), "outbound/x.csv", b"xx")?;
    fixtures::write_file(&sandbox.path("remote"), "outbound/nested/y.csv", b"yy")?;
    let registry = sandbox.registry(
        r#""direction": "download", "remote_path": "/outbound", "root_only": true, "delete_after_transfer": true"#,
    )?;
    let (tenant, config) = registry.get("acme")?;
    let status = StatusStore::new();
    let runner = sandbox.runner(Arc::new(StandardConnector), status.clone())?;
    status.register(tenant, None, Utc::now());

    let summary = runner.run(tenant, config);
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.transferred, 1);
    assert_eq!(summary.archived, 0);
    assert_eq!(fs::read(sandbox.path("in/x.csv"))?, b"xx");
    assert!(!sandbox.path("remote/outbound/x.csv").exists());
    assert!(sandbox.path("remote/outbound/nested/y.csv").exists());
    assert!(!sandbox.path("in/nested").exists());
    Ok(())
}

#[test]
fn unreachable_remote_marks_the_run_failed_and_touches_nothing() -> TestResult {
    let sandbox = Sandbox::new()?;
    fixtures::write_file(&sandbox.path("in"), "a.csv", b"alpha")?;
    fs::remove_dir_all(sandbox.path("remote"))?;
    let registry = sandbox.registry(r#""remote_path": "/upload""#)?;
    let (tenant, config) = registry.get("acme")?;
    let status = StatusStore::new();
    let runner = sandbox.runner(Arc::new(StandardConnector), status.clone())?;
    status.register(tenant, None, Utc::now());

    let summary = runner.run(tenant, config);
    assert_eq!(summary.outcome, RunOutcome::Failed);
    assert!(sandbox.path("in/a.csv").exists());
    assert!(!sandbox.path("archive").exists());
    let phase = status.get(tenant).map(|s| s.phase);
    assert_eq!(phase, Some(JobPhase::Failed));

    let log = fs::read_to_string(sandbox.path("logs/acme.log"))?;
    assert!(log.contains("ERROR job failed"));
    Ok(())
}

#[test]
fn second_run_after_completion_is_admitted() -> TestResult {
    let sandbox = Sandbox::new()?;
    let registry = sandbox.registry(r#""remote_path": "/upload""#)?;
    let (tenant, config) = registry.get("acme")?;
    let status = StatusStore::new();
    let runner = sandbox.runner(Arc::new(StandardConnector), status.clone())?;
    status.register(tenant, None, Utc::now());

    assert_eq!(runner.run(tenant, config).outcome, RunOutcome::Completed);
    fixtures::write_file(&sandbox.path("in"), "later.csv", b"l")?;
    let second = runner.run(tenant, config);
    assert_eq!(second.outcome, RunOutcome::Completed);
    assert_eq!(second.transferred, 1);
    assert!(sandbox.path("remote/upload/later.csv").exists());
    Ok(())
}
