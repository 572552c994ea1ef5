//! JSON document loading for the tenant registry.
//!
//! # Design
//! - The top level is an object keyed by tenant identity.
//! - Keys are collected in document order so duplicates are reported instead
//!   of silently collapsing into the last value.
//! - Raw records reject unknown fields; validation turns them into `TenantConfig`.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use tracing::debug;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    RemoteEndpoint, StagingConfig, TenantConfig, TenantId, TenantRegistry, TransferDirection,
};
use crate::schedule::ScheduleExpr;
use crate::secrets::PasswordSource;
use crate::validate;

/// Read and validate the registry stored at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read, otherwise the
/// errors documented on [`parse_registry`].
pub fn load_registry(path: &Path) -> ConfigResult<TenantRegistry> {
    let document = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "load_registry.read",
        path: path.to_path_buf(),
        source,
    })?;
    let registry = parse_registry(&document)?;
    debug!(path = %path.display(), tenants = registry.len(), "tenant registry loaded");
    Ok(registry)
}

/// Parse and validate a registry document.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed JSON or schema mismatches,
/// [`ConfigError::DuplicateTenant`] for repeated identities, and the field
/// validation errors for individual tenants.
pub fn parse_registry(document: &str) -> ConfigResult<TenantRegistry> {
    let raw: RawRegistry =
        serde_json::from_str(document).map_err(|source| ConfigError::Parse { source })?;
    let mut registry = TenantRegistry::default();
    for (name, record) in raw.0 {
        let tenant = TenantId::parse(&name)?;
        let config = record.validate(tenant.as_str())?;
        registry.insert(tenant, config)?;
    }
    Ok(registry)
}

struct RawRegistry(Vec<(String, RawTenantConfig)>);

impl<'de> Deserialize<'de> for RawRegistry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RegistryVisitor)
    }
}

struct RegistryVisitor;

impl<'de> Visitor<'de> for RegistryVisitor {
    type Value = RawRegistry;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object mapping tenant identities to configurations")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry::<String, RawTenantConfig>()? {
            entries.push(entry);
        }
        Ok(RawRegistry(entries))
    }
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawRemote {
    Sftp {
        host: String,
        #[serde(default = "defaults::sftp_port")]
        port: u16,
        username: String,
        password: PasswordSource,
    },
    Local {
        root: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawExtensions {
    List(Vec<String>),
    Joined(String),
}

impl Default for RawExtensions {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTenantConfig {
    remote: RawRemote,
    #[serde(default)]
    direction: TransferDirection,
    local_path: String,
    remote_path: String,
    archive_path: String,
    #[serde(default)]
    extensions: RawExtensions,
    #[serde(default)]
    root_only: bool,
    #[serde(default)]
    use_staging: bool,
    #[serde(default)]
    staging_path: Option<String>,
    #[serde(default)]
    rename_suffix: Option<String>,
    #[serde(default = "defaults::retention_days")]
    retention_days: u32,
    #[serde(default)]
    delete_after_transfer: bool,
    #[serde(default)]
    delete_archived: bool,
    #[serde(default)]
    schedule: Option<String>,
}

impl RawTenantConfig {
    fn validate(self, tenant: &str) -> ConfigResult<TenantConfig> {
        let remote = match self.remote {
            RawRemote::Sftp {
                host,
                port,
                username,
                password,
            } => {
                if port == 0 {
                    return Err(ConfigError::invalid_field(
                        tenant,
                        "remote.port",
                        "must be between 1 and 65535",
                        Some("0"),
                    ));
                }
                RemoteEndpoint::Sftp {
                    host: validate::required_text(tenant, "remote.host", &host)?,
                    port,
                    username: validate::required_text(tenant, "remote.username", &username)?,
                    password,
                }
            }
            RawRemote::Local { root } => RemoteEndpoint::Local {
                root: validate::required_path(tenant, "remote.root", &root)?,
            },
        };

        let extensions = match &self.extensions {
            RawExtensions::List(items) => {
                validate::extensions(tenant, items.iter().map(String::as_str))?
            }
            RawExtensions::Joined(joined) if joined.trim().is_empty() => Vec::new(),
            RawExtensions::Joined(joined) => validate::extensions(tenant, joined.split(','))?,
        };

        let staging = if self.use_staging {
            let path = self.staging_path.as_deref().ok_or_else(|| {
                ConfigError::invalid_field(
                    tenant,
                    "staging_path",
                    "required when use_staging is set",
                    None,
                )
            })?;
            let suffix = self.rename_suffix.as_deref().ok_or_else(|| {
                ConfigError::invalid_field(
                    tenant,
                    "rename_suffix",
                    "required when use_staging is set",
                    None,
                )
            })?;
            Some(StagingConfig {
                path: validate::required_path(tenant, "staging_path", path)?,
                rename_suffix: validate::rename_suffix(tenant, suffix)?,
            })
        } else {
            None
        };

        if self.retention_days == 0 {
            return Err(ConfigError::invalid_field(
                tenant,
                "retention_days",
                "must be greater than zero",
                Some("0"),
            ));
        }
        if self.delete_after_transfer && self.direction == TransferDirection::Upload {
            return Err(ConfigError::invalid_field(
                tenant,
                "delete_after_transfer",
                "only valid for download tenants",
                None,
            ));
        }

        let schedule = ScheduleExpr::parse(
            self.schedule
                .as_deref()
                .filter(|raw| !raw.trim().is_empty())
                .unwrap_or(defaults::DEFAULT_SCHEDULE),
        )?;

        Ok(TenantConfig {
            remote,
            direction: self.direction,
            local_path: validate::required_path(tenant, "local_path", &self.local_path)?,
            remote_path: validate::required_path(tenant, "remote_path", &self.remote_path)?,
            archive_path: validate::required_path(tenant, "archive_path", &self.archive_path)?,
            extensions,
            root_only: self.root_only,
            staging,
            retention_days: self.retention_days,
            delete_after_transfer: self.delete_after_transfer,
            delete_archived: self.delete_archived,
            schedule,
        })
    }
}
