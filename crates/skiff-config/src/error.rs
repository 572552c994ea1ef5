//! Errors raised while loading and validating tenant configuration.
//!
//! # Design
//! - Constant messages; the offending tenant, field and value travel as context.
//! - Source errors are preserved rather than interpolated.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a tenant document or credential was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration document failed.
    #[error("failed to read configuration document")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path of the document.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The document was not valid JSON or did not match the tenant schema.
    #[error("configuration document is malformed")]
    Parse {
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// A tenant identity was rejected.
    #[error("invalid tenant identity")]
    InvalidTenantId {
        /// Identity as written in the document.
        value: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The same tenant identity appeared more than once.
    #[error("duplicate tenant identity")]
    DuplicateTenant {
        /// Identity that was repeated.
        tenant: String,
    },
    /// A tenant field contained an invalid value.
    #[error("invalid tenant configuration field")]
    InvalidField {
        /// Tenant whose configuration failed validation.
        tenant: String,
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A schedule expression could not be parsed.
    #[error("invalid schedule expression")]
    InvalidSchedule {
        /// Expression as configured.
        value: String,
        /// Source parser error.
        source: cron::error::Error,
    },
    /// A requested tenant is not present in the registry.
    #[error("unknown tenant")]
    UnknownTenant {
        /// Identity that was requested.
        tenant: String,
    },
    /// A required environment variable was not set.
    #[error("missing environment variable")]
    MissingEnv {
        /// Name of the missing variable.
        name: String,
    },
    /// The credential key had an unusable length.
    #[error("invalid credential key")]
    InvalidKey {
        /// Length of the supplied key in bytes.
        length: usize,
    },
    /// An encrypted credential could not be decoded.
    #[error("failed to decode encrypted credential")]
    Decode {
        /// Source base64 error.
        source: base64::DecodeError,
    },
    /// An encrypted credential could not be decrypted.
    #[error("failed to decrypt credential")]
    Decrypt {
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid_field(
        tenant: &str,
        field: &'static str,
        reason: &'static str,
        value: Option<&str>,
    ) -> Self {
        Self::InvalidField {
            tenant: tenant.to_string(),
            field,
            reason,
            value: value.map(str::to_string),
        }
    }
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn invalid_field_helper_captures_context() {
        let err = ConfigError::invalid_field("acme", "local_path", "must not be empty", Some(""));
        assert_eq!(err.to_string(), "invalid tenant configuration field");
        match err {
            ConfigError::InvalidField {
                tenant,
                field,
                reason,
                value,
            } => {
                assert_eq!(tenant, "acme");
                assert_eq!(field, "local_path");
                assert_eq!(reason, "must not be empty");
                assert_eq!(value.as_deref(), Some(""));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn io_error_keeps_source() {
        let err = ConfigError::Io {
            operation: "read",
            path: PathBuf::from("configs.json"),
            source: io::Error::other("disk"),
        };
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "failed to read configuration document");
    }
}
