//! Local-disk backends.
//!
//! `LocalDir` lists the real local filesystem for uploads. `LocalRemote`
//! serves a directory as if it were the remote store: remote paths such as
//! `/inbound/a.csv` resolve beneath its root.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::model::ListedEntry;
use crate::remote::{DirSource, RemoteFs};

/// Lists directories on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDir;

impl DirSource for LocalDir {
    fn list_dir(&self, path: &Path) -> io::Result<Vec<ListedEntry>> {
        read_listing(path)
    }
}

fn read_listing(path: &Path) -> io::Result<Vec<ListedEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        entries.push(ListedEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: metadata.is_dir(),
            modified: metadata.modified().ok(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// A local directory exposed through the remote capability set.
#[derive(Debug, Clone)]
pub struct LocalRemote {
    root: PathBuf,
}

impl LocalRemote {
    /// Serve `root`, which must already exist as a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is missing or not a directory.
    pub fn open(root: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(root)?;
        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                "remote root is not a directory",
            ));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Directory remote paths resolve beneath.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a remote path onto the local root. Parent references are refused.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidInput`] for paths that would escape the root.
    pub fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in path.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "remote path escapes the remote root",
                    ));
                }
            }
        }
        Ok(resolved)
    }
}

impl DirSource for LocalRemote {
    fn list_dir(&self, path: &Path) -> io::Result<Vec<ListedEntry>> {
        read_listing(&self.resolve(path)?)
    }
}

impl RemoteFs for LocalRemote {
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(File::open(self.resolve(path)?)?))
    }

    fn create_write(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(File::create(self.resolve(path)?)?))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(self.resolve(from)?, self.resolve(to)?)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(self.resolve(path)?)
    }

    fn make_dir_recursive(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(self.resolve(path)?)
    }
}
