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

//! In-process job status tracking shared by the runner, scheduler and any
//! status view.
//!
//! # Design
//! - `StatusStore` is an explicit handle passed to whoever needs it; there is
//!   no process-wide singleton.
//! - One mutex guards the whole table. Each call locks once and never performs
//!   IO while holding the guard.
//! - Phase transitions are validated: a run must pass through `Running`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use skiff_config::TenantId;
use thiserror::Error;
use tracing::error;

/// Lifecycle phase of a tenant job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    /// Registered and waiting for its next trigger.
    Scheduled,
    /// A run is in progress.
    Running,
    /// The last run finished.
    Completed,
    /// The last run could not reach the remote.
    Failed,
}

impl JobPhase {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Status of one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    /// Current phase.
    pub phase: JobPhase,
    /// When the most recent run started.
    pub last_run: Option<DateTime<Utc>>,
    /// When the scheduler will next trigger the tenant.
    pub next_run: Option<DateTime<Utc>>,
    /// When this entry last changed.
    pub updated_at: DateTime<Utc>,
    /// Reason recorded by the most recent failed run.
    pub last_error: Option<String>,
}

/// Errors raised by status transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    /// The tenant was never registered.
    #[error("unknown tenant")]
    UnknownTenant {
        /// Tenant identity.
        tenant: String,
    },
    /// A run was requested while one is already active.
    #[error("tenant already running")]
    AlreadyRunning {
        /// Tenant identity.
        tenant: String,
    },
    /// The requested transition is not allowed from the current phase.
    #[error("invalid status transition")]
    InvalidTransition {
        /// Tenant identity.
        tenant: String,
        /// Phase the tenant was in.
        from: JobPhase,
        /// Phase that was requested.
        to: JobPhase,
    },
}

/// Result alias for status operations.
pub type StatusResult<T> = Result<T, StatusError>;

/// Shared, cloneable job status table.
#[derive(Clone, Default)]
pub struct StatusStore {
    inner: Arc<Mutex<HashMap<TenantId, JobStatus>>>,
}

impl StatusStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TenantId, JobStatus>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            error!("job status mutex poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Register a tenant as `Scheduled`, or refresh its next run if it is
    /// already known. Existing phase and history are kept.
    pub fn register(&self, tenant: &TenantId, next_run: Option<DateTime<Utc>>, at: DateTime<Utc>) {
        let mut table = self.lock();
        table
            .entry(tenant.clone())
            .and_modify(|status| {
                status.next_run = next_run;
                status.updated_at = at;
            })
            .or_insert(JobStatus {
                phase: JobPhase::Scheduled,
                last_run: None,
                next_run,
                updated_at: at,
                last_error: None,
            });
    }

    /// Move a tenant into `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::AlreadyRunning`] if a run is active, or
    /// [`StatusError::UnknownTenant`] if the tenant was never registered.
    pub fn begin_run(&self, tenant: &TenantId, at: DateTime<Utc>) -> StatusResult<()> {
        let mut table = self.lock();
        let status = table
            .get_mut(tenant)
            .ok_or_else(|| StatusError::UnknownTenant {
                tenant: tenant.to_string(),
            })?;
        if status.phase == JobPhase::Running {
            return Err(StatusError::AlreadyRunning {
                tenant: tenant.to_string(),
            });
        }
        status.phase = JobPhase::Running;
        status.last_run = Some(at);
        status.updated_at = at;
        Ok(())
    }

    /// Move a running tenant into `Completed`.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::InvalidTransition`] unless the tenant is `Running`.
    pub fn complete(&self, tenant: &TenantId, at: DateTime<Utc>) -> StatusResult<()> {
        self.finish(tenant, at, JobPhase::Completed, None)
    }

    /// Move a running tenant into `Failed`, recording `reason`.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::InvalidTransition`] unless the tenant is `Running`.
    pub fn fail(
        &self,
        tenant: &TenantId,
        at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> StatusResult<()> {
        self.finish(tenant, at, JobPhase::Failed, Some(reason.into()))
    }

    fn finish(
        &self,
        tenant: &TenantId,
        at: DateTime<Utc>,
        to: JobPhase,
        reason: Option<String>,
    ) -> StatusResult<()> {
        let mut table = self.lock();
        let status = table
            .get_mut(tenant)
            .ok_or_else(|| StatusError::UnknownTenant {
                tenant: tenant.to_string(),
            })?;
        if status.phase != JobPhase::Running {
            return Err(StatusError::InvalidTransition {
                tenant: tenant.to_string(),
                from: status.phase,
                to,
            });
        }
        status.phase = to;
        status.updated_at = at;
        status.last_error = reason;
        Ok(())
    }

    /// Publish the next scheduled trigger time.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::UnknownTenant`] if the tenant was never registered.
    pub fn set_next_run(
        &self,
        tenant: &TenantId,
        next_run: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> StatusResult<()> {
        let mut table = self.lock();
        let status = table
            .get_mut(tenant)
            .ok_or_else(|| StatusError::UnknownTenant {
                tenant: tenant.to_string(),
            })?;
        status.next_run = next_run;
        status.updated_at = at;
        Ok(())
    }

    /// Copy of one tenant's status.
    #[must_use]
    pub fn get(&self, tenant: &TenantId) -> Option<JobStatus> {
        self.lock().get(tenant).cloned()
    }

    /// Whether the tenant currently has a run in progress.
    #[must_use]
    pub fn is_running(&self, tenant: &TenantId) -> bool {
        self.lock()
            .get(tenant)
            .is_some_and(|status| status.phase == JobPhase::Running)
    }

    /// Ordered copy of the whole table.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<TenantId, JobStatus> {
        self.lock()
            .iter()
            .map(|(tenant, status)| (tenant.clone(), status.clone()))
            .collect()
    }
}
