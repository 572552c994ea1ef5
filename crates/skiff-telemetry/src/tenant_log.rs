//! Per-tenant append-only log stream.
//!
//! # Design
//! - One text file per tenant at `<log_dir>/<tenant>.log`, opened in append mode.
//! - Every line is mirrored to `tracing` with a `tenant` field and broadcast
//!   through a bounded channel so a status view can tail it.
//! - Writing never fails the caller; file errors are reported via `tracing`.

use std::fmt::{self, Display, Formatter};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::error::{Result, TelemetryError};

const TENANT_LOG_CAPACITY: usize = 256;
const TENANT_LOG_EXTENSION: &str = "log";

/// Severity recorded on each tenant log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Routine progress.
    Info,
    /// Recoverable problem.
    Warn,
    /// Failure of a file, phase or run.
    Error,
}

impl LogLevel {
    /// Upper-case label written to the log file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// A single tenant log entry.
#[derive(Debug, Clone)]
pub struct TenantLogLine {
    /// Tenant the line belongs to.
    pub tenant: Arc<str>,
    /// Severity.
    pub level: LogLevel,
    /// When the line was recorded.
    pub timestamp: DateTime<Utc>,
    /// Message text.
    pub message: String,
}

impl Display for TenantLogLine {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} {} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level.as_str(),
            self.message
        )
    }
}

/// Cloneable handle onto one tenant's log stream.
#[derive(Clone)]
pub struct TenantLog {
    inner: Arc<TenantLogInner>,
}

struct TenantLogInner {
    tenant: Arc<str>,
    path: Option<PathBuf>,
    file: Option<Mutex<File>>,
    sender: broadcast::Sender<TenantLogLine>,
}

impl TenantLog {
    /// Open (or create) `<dir>/<tenant>.log` for appending.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::TenantLogOpen`] when the directory or file
    /// cannot be created.
    pub fn open(dir: &Path, tenant: &str) -> Result<Self> {
        let path = dir.join(format!("{tenant}.{TENANT_LOG_EXTENSION}"));
        fs::create_dir_all(dir).map_err(|source| TelemetryError::TenantLogOpen {
            path: path.clone(),
            source,
        })?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TelemetryError::TenantLogOpen {
                path: path.clone(),
                source,
            })?;
        Ok(Self::build(tenant, Some(path), Some(file)))
    }

    /// A log with no backing file; lines still reach `tracing` and subscribers.
    #[must_use]
    pub fn detached(tenant: &str) -> Self {
        Self::build(tenant, None, None)
    }

    fn build(tenant: &str, path: Option<PathBuf>, file: Option<File>) -> Self {
        let (sender, _) = broadcast::channel(TENANT_LOG_CAPACITY);
        Self {
            inner: Arc::new(TenantLogInner {
                tenant: Arc::from(tenant),
                path,
                file: file.map(Mutex::new),
                sender,
            }),
        }
    }

    /// Tenant this log belongs to.
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.inner.tenant
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Receive every line recorded after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TenantLogLine> {
        self.inner.sender.subscribe()
    }

    /// Record an informational line.
    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message.into());
    }

    /// Record a warning line.
    pub fn warn(&self, message: impl Into<String>) {
        self.record(LogLevel::Warn, message.into());
    }

    /// Record an error line.
    pub fn error(&self, message: impl Into<String>) {
        self.record(LogLevel::Error, message.into());
    }

    fn record(&self, level: LogLevel, message: String) {
        let tenant = self.tenant();
        match level {
            LogLevel::Info => info!(tenant = %tenant, "{message}"),
            LogLevel::Warn => warn!(tenant = %tenant, "{message}"),
            LogLevel::Error => error!(tenant = %tenant, "{message}"),
        }

        let line = TenantLogLine {
            tenant: Arc::clone(&self.inner.tenant),
            level,
            timestamp: Utc::now(),
            message,
        };

        if let Some(file) = &self.inner.file {
            let mut file = lock_file(file, tenant);
            if let Err(err) = writeln!(file, "{line}") {
                warn!(
                    error = %err,
                    tenant = %tenant,
                    path = ?self.inner.path,
                    "failed to append tenant log line"
                );
            }
        }

        let _ = self.inner.sender.send(line);
    }
}

fn lock_file<'a>(file: &'a Mutex<File>, tenant: &str) -> MutexGuard<'a, File> {
    file.lock().unwrap_or_else(|poisoned| {
        error!(tenant = %tenant, "tenant log mutex poisoned; recovering");
        poisoned.into_inner()
    })
}
