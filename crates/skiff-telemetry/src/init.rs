//! Process-wide subscriber installation.
//!
//! # Design
//! - `RUST_LOG` wins over the configured level when it parses.
//! - The build identifier is captured on the first install and reused by
//!   every span that reports it.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt as layers, prelude::*};

use crate::error::{Result, TelemetryError};

/// Level directive applied when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const UNKNOWN_BUILD: &str = "dev";

static INSTALLED_BUILD: OnceCell<String> = OnceCell::new();

/// Settings for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Filter directive such as `info` or `skiff_sync=debug`.
    pub level: &'a str,
    /// Line encoding.
    pub format: LogFormat,
    /// Identifier of the running build.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: UNKNOWN_BUILD,
        }
    }
}

/// Encoding of process log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-oriented text.
    Pretty,
}

impl LogFormat {
    /// Text for debug builds, JSON for release builds.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Name accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        [Self::Json, Self::Pretty]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unsupported log format `{value}` (expected json or pretty)"))
    }
}

/// Install the global subscriber for process logs.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInstall`] when a global subscriber is
/// already in place.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    INSTALLED_BUILD.get_or_init(|| config.build_sha.to_owned());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level));
    let json = (config.format == LogFormat::Json)
        .then(|| layers::layer().json().with_current_span(true).with_target(false));
    let pretty = (config.format == LogFormat::Pretty).then(|| layers::layer().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
        .map_err(|source| TelemetryError::SubscriberInstall { source })
}

/// Build identifier captured by [`init_logging`], or `dev` before install.
#[must_use]
pub fn build_sha() -> &'static str {
    INSTALLED_BUILD.get().map_or(UNKNOWN_BUILD, String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_parse_case_insensitively_and_display_round_trips() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(LogFormat::Pretty.to_string().parse(), Ok(LogFormat::Pretty));
        let err = "xml".parse::<LogFormat>().err().unwrap_or_default();
        assert!(err.contains("xml"));
    }

    #[test]
    fn second_install_is_rejected_and_build_is_kept() {
        let config = LoggingConfig {
            level: "warn",
            format: LogFormat::Pretty,
            build_sha: "abc123",
        };
        let first = init_logging(&config);
        let second = init_logging(&LoggingConfig {
            build_sha: "other",
            ..config
        });
        assert!(matches!(second, Err(TelemetryError::SubscriberInstall { .. })));
        if first.is_ok() {
            assert_eq!(build_sha(), "abc123");
        }
    }
}
