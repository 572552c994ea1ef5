//! Remote filesystem capabilities.
//!
//! # Design
//! - `DirSource` is the listing capability shared by local and remote trees so
//!   one walker serves both directions.
//! - `RemoteFs` adds the byte-stream and namespace operations a transfer needs.
//!   Handles are released when the returned boxes drop.
//! - `Connector` turns a configured endpoint into a live `RemoteFs`; it is the
//!   seam tests replace.

use std::io::{self, Read, Write};
use std::path::Path;

use skiff_config::{Credentials, RemoteEndpoint};

use crate::error::{SyncError, SyncResult};
use crate::model::ListedEntry;

mod local;
#[cfg(feature = "sftp")]
mod sftp;

pub use local::{LocalDir, LocalRemote};
#[cfg(feature = "sftp")]
pub use sftp::SftpRemote;

/// Directory enumeration.
pub trait DirSource {
    /// List the immediate children of `path`.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the directory cannot be read.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<ListedEntry>>;
}

/// Capability set of a remote file store.
pub trait RemoteFs: DirSource {
    /// Open a file for reading.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the file cannot be opened.
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>>;

    /// Create (or truncate) a file for writing.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the file cannot be created.
    fn create_write(&self, path: &Path) -> io::Result<Box<dyn Write>>;

    /// Rename `from` to `to`, replacing any existing `to`.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the rename is refused.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the file cannot be removed.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Create `path` and any missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns the backend error when a directory cannot be created.
    fn make_dir_recursive(&self, path: &Path) -> io::Result<()>;
}

/// Opens remote filesystems for configured endpoints.
pub trait Connector: Send + Sync {
    /// Connect and authenticate.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Connect`] when the endpoint is unreachable or
    /// rejects the credentials, or [`SyncError::Unsupported`] when the
    /// endpoint kind is not available in this build.
    fn connect(
        &self,
        endpoint: &RemoteEndpoint,
        credentials: &Credentials,
    ) -> SyncResult<Box<dyn RemoteFs>>;
}

/// Connector for every endpoint kind compiled into this build.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConnector;

impl Connector for StandardConnector {
    #[cfg_attr(not(feature = "sftp"), allow(unused_variables))]
    fn connect(
        &self,
        endpoint: &RemoteEndpoint,
        credentials: &Credentials,
    ) -> SyncResult<Box<dyn RemoteFs>> {
        match endpoint {
            RemoteEndpoint::Local { root } => {
                let remote = LocalRemote::open(root).map_err(|source| SyncError::Connect {
                    endpoint: format!("local:{}", root.display()),
                    source,
                })?;
                Ok(Box::new(remote))
            }
            #[cfg(feature = "sftp")]
            RemoteEndpoint::Sftp { host, port, .. } => {
                let remote = SftpRemote::connect(host, *port, credentials).map_err(|source| {
                    SyncError::Connect {
                        endpoint: format!("sftp:{host}:{port}"),
                        source,
                    }
                })?;
                Ok(Box::new(remote))
            }
            #[cfg(not(feature = "sftp"))]
            RemoteEndpoint::Sftp { host, port, .. } => Err(SyncError::Unsupported {
                operation: "connect.sftp",
                value: Some(format!("{host}:{port}")),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_test_support::fixtures;

    #[test]
    fn local_endpoint_connects_to_existing_root() -> anyhow::Result<()> {
        let temp = fixtures::temp_dir("skiff-connector-")?;
        fixtures::write_file(temp.path(), "inbound/a.csv", b"a")?;
        let endpoint = RemoteEndpoint::Local {
            root: temp.path().to_path_buf(),
        };
        let remote = StandardConnector.connect(&endpoint, &Credentials::default())?;
        let listed = remote.list_dir(Path::new("/inbound"))?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "a.csv");
        Ok(())
    }

    #[test]
    fn missing_local_root_is_a_connect_error() -> anyhow::Result<()> {
        let temp = fixtures::temp_dir("skiff-connector-")?;
        let endpoint = RemoteEndpoint::Local {
            root: temp.path().join("absent"),
        };
        let result = StandardConnector.connect(&endpoint, &Credentials::default());
        assert!(matches!(result, Err(SyncError::Connect { .. })));
        Ok(())
    }

    #[cfg(not(feature = "sftp"))]
    #[test]
    fn sftp_without_feature_is_unsupported() {
        let endpoint = RemoteEndpoint::Sftp {
            host: "sftp.example.com".into(),
            port: 22,
            username: "acme".into(),
            password: skiff_config::PasswordSource::Env("UNUSED".into()),
        };
        let result = StandardConnector.connect(&endpoint, &Credentials::default());
        assert!(matches!(result, Err(SyncError::Unsupported { .. })));
    }
}
