//! Job, transfer and retention counters on a private Prometheus registry.
//!
//! # Design
//! - Collectors are registered once in `new`; callers only see typed recorders.
//! - Exposes the counters and gauges the job runner and scheduler report.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the runner and scheduler.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    transfers_total: IntCounterVec,
    job_runs_total: IntCounterVec,
    archived_files_total: IntCounter,
    retention_removed_total: IntCounter,
    running_jobs: IntGauge,
}

/// Snapshot of selected gauges and counters for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Jobs currently executing.
    pub running_jobs: i64,
    /// Successful file transfers across all tenants.
    pub transfers_succeeded: u64,
    /// Failed file transfers across all tenants.
    pub transfers_failed: u64,
    /// Files moved into archive buckets.
    pub archived_files_total: u64,
    /// Archive entries removed by retention sweeps.
    pub retention_removed_total: u64,
}

fn collector<T>(name: &'static str, built: prometheus::Result<T>) -> Result<T> {
    built.map_err(|source| TelemetryError::MetricsCollector { name, source })
}

impl Metrics {
    /// Fresh registry with every skiff collector registered.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::MetricsCollector`] or
    /// [`TelemetryError::MetricsRegister`] when a collector is rejected.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let transfers_total = collector(
            "skiff_transfers_total",
            IntCounterVec::new(
                Opts::new("skiff_transfers_total", "File transfers by direction and outcome"),
                &["direction", "outcome"],
            ),
        )?;
        let job_runs_total = collector(
            "skiff_job_runs_total",
            IntCounterVec::new(
                Opts::new("skiff_job_runs_total", "Tenant job runs by outcome"),
                &["outcome"],
            ),
        )?;
        let archived_files_total = collector(
            "skiff_archived_files_total",
            IntCounter::with_opts(Opts::new(
                "skiff_archived_files_total",
                "Local files moved into archive buckets",
            )),
        )?;
        let retention_removed_total = collector(
            "skiff_retention_removed_total",
            IntCounter::with_opts(Opts::new(
                "skiff_retention_removed_total",
                "Archive entries removed by retention sweeps",
            )),
        )?;
        let running_jobs = collector(
            "skiff_running_jobs",
            IntGauge::with_opts(Opts::new("skiff_running_jobs", "Jobs currently executing")),
        )?;

        let register = |name: &'static str, metric: Box<dyn prometheus::core::Collector>| {
            registry
                .register(metric)
                .map_err(|source| TelemetryError::MetricsRegister { name, source })
        };
        register("skiff_transfers_total", Box::new(transfers_total.clone()))?;
        register("skiff_job_runs_total", Box::new(job_runs_total.clone()))?;
        register(
            "skiff_archived_files_total",
            Box::new(archived_files_total.clone()),
        )?;
        register(
            "skiff_retention_removed_total",
            Box::new(retention_removed_total.clone()),
        )?;
        register("skiff_running_jobs", Box::new(running_jobs.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                transfers_total,
                job_runs_total,
                archived_files_total,
                retention_removed_total,
                running_jobs,
            }),
        })
    }

    /// Count one file transfer.
    pub fn inc_transfer(&self, direction: &str, outcome: &str) {
        self.inner
            .transfers_total
            .with_label_values(&[direction, outcome])
            .inc();
    }

    /// Count one finished job run.
    pub fn inc_job_run(&self, outcome: &str) {
        self.inner.job_runs_total.with_label_values(&[outcome]).inc();
    }

    /// Count files moved into the archive.
    pub fn add_archived(&self, count: u64) {
        self.inner.archived_files_total.inc_by(count);
    }

    /// Count archive entries removed by retention.
    pub fn add_retention_removed(&self, count: u64) {
        self.inner.retention_removed_total.inc_by(count);
    }

    /// Mark a job as started.
    pub fn job_started(&self) {
        self.inner.running_jobs.inc();
    }

    /// Mark a job as finished.
    pub fn job_finished(&self) {
        self.inner.running_jobs.dec();
    }

    /// Text exposition of all collectors.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::MetricsEncode`] or
    /// [`TelemetryError::MetricsUtf8`] when exposition fails.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Current counter and gauge values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let transfers = |outcome: &str| {
            ["upload", "download"]
                .into_iter()
                .map(|direction| {
                    self.inner
                        .transfers_total
                        .with_label_values(&[direction, outcome])
                        .get()
                })
                .sum::<u64>()
        };
        MetricsSnapshot {
            running_jobs: self.inner.running_jobs.get(),
            transfers_succeeded: transfers("success"),
            transfers_failed: transfers("failure"),
            archived_files_total: self.inner.archived_files_total.get(),
            retention_removed_total: self.inner.retention_removed_total.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tracks_recorded_runs() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_transfer("upload", "success");
        metrics.inc_transfer("download", "success");
        metrics.inc_transfer("upload", "failure");
        metrics.inc_job_run("completed");
        metrics.add_archived(3);
        metrics.add_retention_removed(2);
        metrics.job_started();
        metrics.job_started();
        metrics.job_finished();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.running_jobs, 1);
        assert_eq!(snapshot.transfers_succeeded, 2);
        assert_eq!(snapshot.transfers_failed, 1);
        assert_eq!(snapshot.archived_files_total, 3);
        assert_eq!(snapshot.retention_removed_total, 2);

        let rendered = metrics.render()?;
        assert!(rendered.contains("skiff_transfers_total"));
        assert!(rendered.contains("skiff_job_runs_total"));
        assert!(rendered.contains("skiff_running_jobs"));
        Ok(())
    }
}
