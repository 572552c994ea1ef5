//! # Design
//!
//! - Centralize application-level errors for bootstrap and command dispatch.
//! - Messages stay fixed; the failing operation and path travel as fields.
//! - Job failures never surface here; the runner records them per tenant.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for the binary.
pub type AppResult<T> = Result<T, AppError>;

/// Failures that abort the `skiff` process.
#[derive(Debug, Error)]
pub enum AppError {
    /// The registry could not be loaded or a tenant resolved.
    #[error("tenant configuration unusable")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: skiff_config::ConfigError,
    },
    /// Logging or metrics could not be set up.
    #[error("telemetry setup failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: skiff_telemetry::TelemetryError,
    },
    /// IO operations failed.
    #[error("process io failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
    /// A background task could not be joined.
    #[error("background task failed")]
    Join {
        /// Operation identifier.
        operation: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: skiff_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: skiff_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn join(operation: &'static str, source: tokio::task::JoinError) -> Self {
        Self::Join { operation, source }
    }

    /// Process exit code: 2 for configuration problems, 3 for everything else.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } => 2,
            Self::Telemetry { .. } | Self::Io { .. } | Self::Join { .. } => 3,
        }
    }

    /// Message, operation and the full source chain on one line.
    #[must_use]
    pub fn display_message(&self) -> String {
        let operation = match self {
            Self::Config { operation, .. }
            | Self::Telemetry { operation, .. }
            | Self::Io { operation, .. }
            | Self::Join { operation, .. } => operation,
        };
        let mut message = format!("{self} ({operation})");
        if let Self::Io {
            path: Some(path), ..
        } = self
        {
            message.push_str(&format!(" [{}]", path.display()));
        }
        let mut cause = self.source();
        while let Some(err) = cause {
            message.push_str(&format!(": {err}"));
            cause = err.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "registry.get",
            skiff_config::ConfigError::UnknownTenant {
                tenant: "acme".into(),
            },
        );
        assert!(matches!(config, AppError::Config { .. }));
        assert_eq!(config.exit_code(), 2);

        let io = AppError::Io {
            operation: "signal.ctrl_c",
            path: Some(PathBuf::from("/tmp/x")),
            source: io::Error::other("boom"),
        };
        assert_eq!(io.exit_code(), 3);
        let message = io.display_message();
        assert!(message.starts_with("process io failed (signal.ctrl_c)"));
        assert!(message.contains("[/tmp/x]"));
        assert!(message.ends_with(": boom"));
    }

    #[tokio::test]
    async fn join_errors_map_to_failure_exit_code() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let Err(join_error) = handle.await else {
            panic!("aborted task should not complete");
        };
        let err = AppError::join("scheduler.shutdown", join_error);
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("scheduler.shutdown"));
    }
}
