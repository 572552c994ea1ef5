//! # Design
//!
//! - Failures of the process subscriber, the tenant log file and the metrics
//!   registry share one error type so callers map them in a single place.
//! - Messages stay constant; the metric name or file path rides along as a field.

use std::io;
use std::path::PathBuf;
use std::string::FromUtf8Error;

use prometheus::Error as PrometheusError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while setting up or using telemetry sinks.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already present or could not be set.
    #[error("process subscriber could not be installed")]
    SubscriberInstall {
        /// Error reported by `tracing-subscriber`.
        source: TryInitError,
    },
    /// A counter or gauge definition was rejected.
    #[error("metric definition rejected")]
    MetricsCollector {
        /// Metric that failed.
        name: &'static str,
        /// Error reported by `prometheus`.
        source: PrometheusError,
    },
    /// The registry refused a collector, usually a duplicate name.
    #[error("metric registration rejected")]
    MetricsRegister {
        /// Metric that failed.
        name: &'static str,
        /// Error reported by `prometheus`.
        source: PrometheusError,
    },
    /// Text exposition of the registry failed.
    #[error("metric exposition failed")]
    MetricsEncode {
        /// Error reported by `prometheus`.
        source: PrometheusError,
    },
    /// The exposition buffer held invalid UTF-8.
    #[error("metric exposition was not utf-8")]
    MetricsUtf8 {
        /// Conversion failure.
        source: FromUtf8Error,
    },
    /// The per-tenant log directory or file could not be opened.
    #[error("tenant log unavailable")]
    TenantLogOpen {
        /// Directory or file that failed.
        path: PathBuf,
        /// Filesystem error.
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn prometheus_failure() -> PrometheusError {
        PrometheusError::Msg("rejected".into())
    }

    #[test]
    fn metric_errors_keep_name_out_of_message() {
        let err = TelemetryError::MetricsRegister {
            name: "skiff_job_runs_total",
            source: prometheus_failure(),
        };
        assert_eq!(err.to_string(), "metric registration rejected");
        assert!(!err.to_string().contains("skiff_job_runs_total"));
        assert!(err.source().is_some());

        let encode = TelemetryError::MetricsEncode {
            source: prometheus_failure(),
        };
        assert_eq!(encode.to_string(), "metric exposition failed");
    }

    #[test]
    fn utf8_and_log_file_errors_expose_their_source() -> anyhow::Result<()> {
        let utf8 = String::from_utf8(vec![0xff, 0xfe])
            .err()
            .ok_or_else(|| anyhow::anyhow!("bytes unexpectedly decoded"))?;
        let err = TelemetryError::MetricsUtf8 { source: utf8 };
        assert!(err.source().is_some());

        let log = TelemetryError::TenantLogOpen {
            path: PathBuf::from("logs/acme.log"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(log.to_string(), "tenant log unavailable");
        let source = log
            .source()
            .ok_or_else(|| anyhow::anyhow!("source missing"))?;
        assert_eq!(source.to_string(), "denied");
        Ok(())
    }
}
