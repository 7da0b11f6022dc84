//! Enumerating the files available for tailing under a root directory.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

/// Snapshot source for the regular files directly under a root directory.
///
/// Every call to [`list`](Directory::list) reads the directory afresh;
/// nothing is cached between calls.
#[derive(Clone, Debug)]
pub struct Directory {
    root: PathBuf,
    sort: bool,
}

impl Directory {
    pub fn new(config: &Config) -> Self {
        Directory {
            root: config.root_dir().to_path_buf(),
            sort: config.sorts_listing(),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Lists the names of regular files directly under the root.
    ///
    /// Directories are skipped, symlinks count by what they point to, and
    /// names that are not valid UTF-8 are left out. Order is whatever the
    /// directory yields unless sorting was requested in the [`Config`].
    pub async fn list(&self) -> Result<Vec<String>> {
        let unreadable = |source| Error::DirectoryUnreadable {
            path: self.root.clone(),
            source,
        };

        let mut entries = fs::read_dir(&self.root).await.map_err(unreadable)?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            // Follows symlinks; dangling ones simply aren't files.
            let is_file = match fs::metadata(entry.path()).await {
                Ok(meta) => meta.is_file(),
                Err(_) => false,
            };
            if !is_file {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => debug!(name = ?raw, "skipping non-UTF-8 file name"),
            }
        }

        if self.sort {
            names.sort_unstable();
        }

        debug!(root = %self.root.display(), count = names.len(), "listed directory");
        Ok(names)
    }

    /// Joins a bare file name onto the root.
    ///
    /// Only a single normal path component is accepted; separators, `.`,
    /// `..` and absolute paths are rejected without touching the filesystem.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();

        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name => Ok(self.root.join(name)),
            _ => Err(Error::InvalidName {
                name: name.to_string(),
            }),
        }
    }
}
