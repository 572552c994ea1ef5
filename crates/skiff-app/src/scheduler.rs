//! Schedule-driven job triggering.
//!
//! # Design
//! - One task per tenant sleeps until the tenant's next fire time, then hands
//!   the blocking job to `spawn_blocking`.
//! - A tenant never has two runs in flight: a trigger that finds the previous
//!   run unfinished is skipped.
//! - Shutdown stops new triggers and waits for in-flight runs; a transfer is
//!   never cancelled midway.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use skiff_config::{TenantConfig, TenantId, TenantRegistry};
use skiff_runtime::StatusStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::runner::JobRunner;

/// Result of one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A run was started.
    Started,
    /// The previous run was still in flight.
    SkippedStillRunning,
}

/// Registers tenants and drives their schedules.
pub struct Scheduler {
    runner: Arc<JobRunner>,
    registry: TenantRegistry,
}

impl Scheduler {
    /// Scheduler for every tenant in `registry`.
    #[must_use]
    pub const fn new(runner: Arc<JobRunner>, registry: TenantRegistry) -> Self {
        Self { runner, registry }
    }

    /// Register every tenant as scheduled and start one task per tenant.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let status = self.runner.status().clone();
        let now = Utc::now();
        let mut tasks = Vec::with_capacity(self.registry.len());

        for (tenant, config) in self.registry.iter() {
            status.register(tenant, config.schedule.next_after(now), now);
            let slot = TenantSlot::new(
                tenant.clone(),
                Arc::new(config.clone()),
                Arc::clone(&self.runner),
            );
            info!(tenant = %tenant, schedule = %config.schedule, "tenant scheduled");
            tasks.push(tokio::spawn(drive(
                slot,
                status.clone(),
                shutdown_rx.clone(),
            )));
        }

        SchedulerHandle {
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

/// Handle onto running tenant tasks.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Number of tenant tasks.
    #[must_use]
    pub fn tenants(&self) -> usize {
        self.tasks.len()
    }

    /// Stop scheduling and wait for in-flight runs to finish.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Join`] if a tenant task panicked.
    pub async fn shutdown(self) -> AppResult<()> {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            task.await
                .map_err(|err| AppError::join("scheduler.shutdown", err))?;
        }
        info!("scheduler stopped");
        Ok(())
    }
}

async fn drive(mut slot: TenantSlot, status: StatusStore, mut shutdown: watch::Receiver<bool>) {
    loop {
        let now = Utc::now();
        let Some(next) = slot.config.schedule.next_after(now) else {
            warn!(tenant = %slot.tenant, "schedule has no future fire time");
            break;
        };
        if let Err(err) = status.set_next_run(&slot.tenant, Some(next), now) {
            warn!(tenant = %slot.tenant, error = %err, "next run not published");
        }
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        debug!(tenant = %slot.tenant, next_run = %next, "waiting for next trigger");

        tokio::select! {
            () = tokio::time::sleep(wait) => {
                slot.trigger();
            }
            _ = shutdown.changed() => break,
        }
    }
    slot.drain().await;
}

/// In-flight tracking for one tenant.
struct TenantSlot {
    tenant: TenantId,
    config: Arc<TenantConfig>,
    runner: Arc<JobRunner>,
    in_flight: Option<JoinHandle<()>>,
}

impl TenantSlot {
    const fn new(tenant: TenantId, config: Arc<TenantConfig>, runner: Arc<JobRunner>) -> Self {
        Self {
            tenant,
            config,
            runner,
            in_flight: None,
        }
    }

    fn trigger(&mut self) -> TriggerOutcome {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
        {
            warn!(tenant = %self.tenant, "previous run still in progress; trigger skipped");
            return TriggerOutcome::SkippedStillRunning;
        }

        let tenant = self.tenant.clone();
        let config = Arc::clone(&self.config);
        let runner = Arc::clone(&self.runner);
        self.in_flight = Some(tokio::spawn(async move {
            let label = tenant.clone();
            match tokio::task::spawn_blocking(move || runner.run(&tenant, &config)).await {
                Ok(summary) => debug!(
                    tenant = %label,
                    run_id = %summary.run_id,
                    outcome = %summary.outcome,
                    "scheduled run finished"
                ),
                Err(err) => error!(tenant = %label, error = %err, "scheduled run panicked"),
            }
        }));
        TriggerOutcome::Started
    }

    async fn drain(&mut self) {
        if let Some(handle) = self.in_flight.take()
            && let Err(err) = handle.await
        {
            error!(tenant = %self.tenant, error = %err, "in-flight run did not finish cleanly");
        }
    }
}
