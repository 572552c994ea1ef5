//! Lazy depth-first tree enumeration.
//!
//! # Design
//! - The walker is an `Iterator` of `Result<WalkEntry, SyncError>`; a listing
//!   failure is yielded for that subtree and the walk carries on with siblings.
//! - Directories are always yielded and never filtered. Files are yielded only
//!   when the extension filter allows them.
//! - A directory is listed on the call after it is yielded, so entries are
//!   produced one at a time in listing order.

use std::path::{Path, PathBuf};
use std::vec;

use crate::error::{SyncError, SyncResult};
use crate::model::{ListedEntry, WalkEntry};
use crate::remote::DirSource;

/// Extension allow-list. Matching is case-sensitive on the text after the
/// final `.` of the file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    allowed: Vec<String>,
}

impl ExtensionFilter {
    /// Build a filter from extensions given without a leading dot. An empty
    /// list allows every file.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `file_name` passes the filter.
    #[must_use]
    pub fn allows(&self, file_name: &str) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        file_name
            .rfind('.')
            .map(|idx| &file_name[idx + 1..])
            .is_some_and(|ext| self.allowed.iter().any(|allowed| allowed == ext))
    }
}

struct Frame {
    relative: PathBuf,
    entries: vec::IntoIter<ListedEntry>,
}

/// Depth-first walker over any [`DirSource`].
pub struct TreeWalker<'a, S: DirSource + ?Sized> {
    source: &'a S,
    root: PathBuf,
    filter: ExtensionFilter,
    root_only: bool,
    stack: Vec<Frame>,
    pending: Option<PathBuf>,
}

impl<'a, S: DirSource + ?Sized> TreeWalker<'a, S> {
    /// Walk `root` on `source`. With `root_only`, subdirectories are yielded
    /// but not entered.
    pub fn new(source: &'a S, root: &Path, filter: ExtensionFilter, root_only: bool) -> Self {
        Self {
            source,
            root: root.to_path_buf(),
            filter,
            root_only,
            stack: Vec::new(),
            pending: Some(PathBuf::new()),
        }
    }

    fn descend(&mut self, relative: PathBuf) -> SyncResult<()> {
        let absolute = self.root.join(&relative);
        let entries = self
            .source
            .list_dir(&absolute)
            .map_err(|source| SyncError::list(absolute, source))?;
        self.stack.push(Frame {
            relative,
            entries: entries.into_iter(),
        });
        Ok(())
    }
}

impl<S: DirSource + ?Sized> Iterator for TreeWalker<'_, S> {
    type Item = SyncResult<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(relative) = self.pending.take()
            && let Err(err) = self.descend(relative)
        {
            return Some(Err(err));
        }

        loop {
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };
            let relative = frame.relative.join(&entry.name);
            if entry.is_dir {
                if !self.root_only {
                    self.pending = Some(relative.clone());
                }
                return Some(Ok(WalkEntry {
                    relative,
                    is_dir: true,
                    modified: entry.modified,
                }));
            }
            if self.filter.allows(&entry.name) {
                return Some(Ok(WalkEntry {
                    relative,
                    is_dir: false,
                    modified: entry.modified,
                }));
            }
        }
    }
}
