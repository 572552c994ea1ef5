//! SFTP backend built on `ssh2`.
//!
//! Password authentication only. Connection-level timeouts are applied to the
//! session so a stalled server fails the run instead of hanging it.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use skiff_config::Credentials;
use ssh2::{RenameFlags, Session, Sftp};
use tracing::debug;

use crate::model::ListedEntry;
use crate::remote::{DirSource, RemoteFs};

const SESSION_TIMEOUT_MS: u32 = 30_000;
const DIR_MODE: i32 = 0o755;

/// An authenticated SFTP session.
pub struct SftpRemote {
    _session: Session,
    sftp: Sftp,
}

impl SftpRemote {
    /// Connect to `host:port` and authenticate with a password.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection, SSH handshake, authentication
    /// or SFTP subsystem start fails.
    pub fn connect(host: &str, port: u16, credentials: &Credentials) -> io::Result<Self> {
        let tcp = TcpStream::connect((host, port))?;
        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(SESSION_TIMEOUT_MS);
        session.handshake()?;
        session.userauth_password(&credentials.username, credentials.password())?;
        if !session.authenticated() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "sftp authentication rejected",
            ));
        }
        let sftp = session.sftp()?;
        debug!(host = %host, port, "sftp session established");
        Ok(Self {
            _session: session,
            sftp,
        })
    }
}

impl DirSource for SftpRemote {
    fn list_dir(&self, path: &Path) -> io::Result<Vec<ListedEntry>> {
        let mut entries: Vec<ListedEntry> = self
            .sftp
            .readdir(path)?
            .into_iter()
            .filter_map(|(child, stat)| {
                let name = child.file_name()?.to_string_lossy().into_owned();
                if name == "." || name == ".." {
                    return None;
                }
                Some(ListedEntry {
                    name,
                    is_dir: stat.is_dir(),
                    modified: stat.mtime.map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

impl RemoteFs for SftpRemote {
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(self.sftp.open(path)?))
    }

    fn create_write(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(self.sftp.create(path)?))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let flags = RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE;
        self.sftp.rename(from, to, Some(flags))?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.sftp.unlink(path)?;
        Ok(())
    }

    fn make_dir_recursive(&self, path: &Path) -> io::Result<()> {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            if current.parent().is_none() {
                continue;
            }
            if self.sftp.stat(&current).is_err() {
                self.sftp.mkdir(&current, DIR_MODE)?;
            }
        }
        Ok(())
    }
}
