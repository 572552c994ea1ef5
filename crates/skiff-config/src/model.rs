//! Typed tenant configuration models.
//!
//! # Design
//! - Pure data carriers; every value here has already passed validation.
//! - `TenantConfig` is immutable for the duration of a run.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::schedule::ScheduleExpr;
use crate::secrets::PasswordSource;

/// Opaque tenant identity used as the registry key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant identity.
    ///
    /// The identity names the tenant log file, so separators and parent
    /// references are rejected along with blank values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTenantId`] when the identity is blank or
    /// contains path components.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let reason = if raw.trim().is_empty() {
            Some("must not be empty")
        } else if raw.trim() != raw {
            Some("must not have surrounding whitespace")
        } else if raw.contains(['/', '\\']) {
            Some("must not contain path separators")
        } else if raw.contains("..") {
            Some("must not contain '..'")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ConfigError::InvalidTenantId {
                value: raw.to_string(),
                reason,
            }),
            None => Ok(Self(raw.to_string())),
        }
    }

    /// Borrow the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TenantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Which way files move during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    /// Local tree to remote tree.
    #[default]
    Upload,
    /// Remote tree to local tree.
    Download,
}

impl TransferDirection {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

/// Where the remote tree lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEndpoint {
    /// An SFTP server.
    Sftp {
        /// Host name or address.
        host: String,
        /// TCP port.
        port: u16,
        /// Login name.
        username: String,
        /// Where the password comes from.
        password: PasswordSource,
    },
    /// A local directory standing in for the remote tree.
    Local {
        /// Directory that remote paths are resolved beneath.
        root: PathBuf,
    },
}

impl RemoteEndpoint {
    /// Label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Sftp { .. } => "sftp",
            Self::Local { .. } => "local",
        }
    }
}

/// Upload staging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingConfig {
    /// Remote directory that receives in-flight uploads.
    pub path: PathBuf,
    /// Extension applied once the staged write completes, always starting with `.`.
    pub rename_suffix: String,
}

/// Validated, immutable configuration for one tenant.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    /// Remote endpoint and credentials source.
    pub remote: RemoteEndpoint,
    /// Transfer direction for every run.
    pub direction: TransferDirection,
    /// Local tree root.
    pub local_path: PathBuf,
    /// Remote tree root.
    pub remote_path: PathBuf,
    /// Root of the dated archive buckets.
    pub archive_path: PathBuf,
    /// Allowed extensions without the leading dot; empty allows everything.
    pub extensions: Vec<String>,
    /// Only the immediate children of the source root are considered.
    pub root_only: bool,
    /// Staged publish settings for uploads.
    pub staging: Option<StagingConfig>,
    /// Archive entries older than this many days are removed.
    pub retention_days: u32,
    /// Remove each remote source after a successful download.
    pub delete_after_transfer: bool,
    /// Remove archived copies after they are moved into the bucket.
    pub delete_archived: bool,
    /// When the scheduler triggers this tenant.
    pub schedule: ScheduleExpr,
}

/// Ordered mapping of tenant identity to configuration.
#[derive(Debug, Clone, Default)]
pub struct TenantRegistry {
    tenants: BTreeMap<TenantId, TenantConfig>,
}

impl TenantRegistry {
    pub(crate) fn insert(&mut self, tenant: TenantId, config: TenantConfig) -> ConfigResult<()> {
        if self.tenants.contains_key(&tenant) {
            return Err(ConfigError::DuplicateTenant {
                tenant: tenant.to_string(),
            });
        }
        self.tenants.insert(tenant, config);
        Ok(())
    }

    /// Look up a tenant by its raw identity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownTenant`] when no tenant matches.
    pub fn get(&self, tenant: &str) -> ConfigResult<(&TenantId, &TenantConfig)> {
        self.tenants
            .iter()
            .find(|(id, _)| id.as_str() == tenant)
            .ok_or_else(|| ConfigError::UnknownTenant {
                tenant: tenant.to_string(),
            })
    }

    /// Iterate tenants in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&TenantId, &TenantConfig)> {
        self.tenants.iter()
    }

    /// Number of configured tenants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    /// Whether the registry has no tenants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_rejects_blank_and_path_like_values() {
        for raw in ["", "   ", " acme", "a/b", "a\\b", "..", "x..y"] {
            assert!(
                matches!(TenantId::parse(raw), Err(ConfigError::InvalidTenantId { .. })),
                "expected {raw:?} to be rejected"
            );
        }
        let id = TenantId::parse("acme-corp").map_err(|err| err.to_string());
        assert_eq!(id.as_ref().map(TenantId::as_str), Ok("acme-corp"));
    }

    #[test]
    fn tenant_id_serializes_as_plain_string() -> serde_json::Result<()> {
        let id = TenantId("acme".to_string());
        assert_eq!(serde_json::to_string(&id)?, "\"acme\"");
        Ok(())
    }

    #[test]
    fn direction_labels_are_stable() {
        assert_eq!(TransferDirection::Upload.as_str(), "upload");
        assert_eq!(TransferDirection::Download.as_str(), "download");
        assert_eq!(TransferDirection::default(), TransferDirection::Upload);
    }
}
