//! Directory listings for `GET /api/files`
//!
//! Listings are produced from `std::fs::read_dir` in enumeration order. The
//! recursive walk is depth-first pre-order: each directory is reported before
//! its descendants. Symlinks are followed; a directory that resolves to one of
//! its own ancestors is reported but not entered, and descent stops at
//! `max_depth`. Two links to the same folder from different branches are
//! both listed in full.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::config::ListingSettings;
use crate::fs_utils;
use crate::schema::{DirectoryListing, FileEntry};
use crate::{FileServerError, Result};

/// Lists directory contents below a root
#[derive(Debug, Clone)]
pub struct Lister {
    root: PathBuf,
    ignored: HashSet<String>,
    max_depth: usize,
}

impl Lister {
    pub fn new(root: impl Into<PathBuf>, settings: &ListingSettings) -> Self {
        Self {
            root: root.into(),
            ignored: settings.ignored_files.iter().cloned().collect(),
            max_depth: settings.max_depth,
        }
    }

    /// List `dir`, which must already be resolved inside the root.
    ///
    /// A missing directory yields an empty listing; a regular file is a bad request.
    pub fn list(&self, dir: &Path, recursive: bool) -> Result<DirectoryListing> {
        let mut listing = DirectoryListing::default();
        if !dir.exists() {
            return Ok(listing);
        }
        if !dir.is_dir() {
            return Err(FileServerError::bad_request(format!(
                "Not a directory: {}",
                self.relative(dir)
            )));
        }

        if recursive {
            let mut ancestors = Vec::new();
            if let Ok(canonical) = fs_utils::canonicalize(dir) {
                ancestors.push(canonical);
            }
            self.walk(dir, 0, &mut ancestors, &mut listing)?;
        } else {
            for (entry, is_dir) in self.read_entries(dir)? {
                if is_dir {
                    listing.directories.push(entry);
                } else {
                    listing.files.push(entry);
                }
            }
        }

        Ok(listing)
    }

    fn walk(
        &self,
        dir: &Path,
        depth: usize,
        ancestors: &mut Vec<PathBuf>,
        listing: &mut DirectoryListing,
    ) -> Result<()> {
        for (entry, is_dir) in self.read_entries(dir)? {
            if !is_dir {
                listing.files.push(entry);
                continue;
            }

            let child = entry.absolute_path.clone();
            listing.directories.push(entry);

            if depth + 1 > self.max_depth {
                tracing::debug!("Listing depth limit reached at {}", child.display());
                continue;
            }
            match fs_utils::canonicalize(&child) {
                Ok(canonical) if ancestors.contains(&canonical) => {
                    tracing::warn!("Skipping symlink cycle at {}", child.display());
                }
                Ok(canonical) => {
                    ancestors.push(canonical);
                    let walked = self.walk(&child, depth + 1, ancestors, listing);
                    ancestors.pop();
                    walked?;
                }
                Err(e) => tracing::warn!("Cannot resolve {}: {}", child.display(), e),
            }
        }
        Ok(())
    }

    /// Entries of one directory with their directory flag, ignored names removed
    fn read_entries(&self, dir: &Path) -> Result<Vec<(FileEntry, bool)>> {
        let mut entries = Vec::new();
        for item in fs::read_dir(dir)? {
            let item = item?;
            let name = item.file_name().to_string_lossy().into_owned();
            if self.ignored.contains(&name) {
                continue;
            }

            let path = item.path();
            // follows symlinks
            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let modified_at: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| DateTime::from(std::time::UNIX_EPOCH));

            entries.push((
                FileEntry {
                    relative_path: self.relative(&path),
                    name,
                    absolute_path: path,
                    size_bytes: metadata.len(),
                    modified_at,
                },
                metadata.is_dir(),
            ));
        }
        Ok(entries)
    }

    fn relative(&self, path: &Path) -> String {
        fs_utils::relative_slash(&self.root, path).unwrap_or_else(|| fs_utils::to_slash(path))
    }
}
