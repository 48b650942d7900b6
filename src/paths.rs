//! Root-confined path resolution for client supplied paths
//!
//! Every path that arrives over HTTP is relative to the served root directory.
//! Resolution is lexical: leading separators and drive prefixes are dropped,
//! `.` is ignored and any `..` component is rejected, so a resolved path can
//! never name anything outside the root.
//!
//! Symlinks inside the root are not inspected; a link that points outside the
//! root is followed like any other file.

use std::path::{Component, Path, PathBuf};

use crate::{FileServerError, Result};

/// Resolve a client path against `root`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use genesys_devserver::paths::resolve_within_root;
///
/// let root = Path::new("/srv/game");
/// assert_eq!(
///     resolve_within_root(root, "scenes/level1.json").unwrap(),
///     root.join("scenes").join("level1.json")
/// );
/// assert!(resolve_within_root(root, "../etc/passwd").is_err());
/// ```
pub fn resolve_within_root(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => resolved.push(name),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(FileServerError::bad_request(format!(
                    "Path must stay inside the project directory: {}",
                    relative
                )));
            }
        }
    }
    Ok(resolved)
}

/// Resolve an optional client path, treating `None` as the root itself.
pub fn resolve_optional(root: &Path, relative: Option<&str>) -> Result<PathBuf> {
    match relative {
        Some(p) => resolve_within_root(root, p),
        None => Ok(root.to_path_buf()),
    }
}
