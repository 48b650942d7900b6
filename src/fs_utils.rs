//! Cross-platform filesystem utilities
//!
//! - `normalize_path`: Strips Windows `\\?\` prefix from canonicalized paths
//! - `canonicalize`: `fs::canonicalize` followed by `normalize_path`
//! - `to_slash`: Renders a relative path with `/` separators for the wire

use std::io;
use std::path::{Component, Path, PathBuf};

/// Normalize Windows paths by removing the `\\?\` prefix if present.
///
/// On Windows, `Path::canonicalize()` returns paths with the extended-length path prefix
/// (`\\?\C:\...`). Watcher events and `strip_prefix` comparisons use the plain form,
/// so every canonical root goes through here. No-op on Unix.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use genesys_devserver::fs_utils::normalize_path;
///
/// let path = PathBuf::from("/home/user/project");
/// assert_eq!(normalize_path(&path), path);
/// ```
pub fn normalize_path(path: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        let s = path.to_string_lossy();
        // Handle UNC paths: \\?\UNC\server\share -> \\server\share
        if let Some(stripped) = s.strip_prefix(r"\\?\UNC\") {
            return PathBuf::from(format!(r"\\{}", stripped));
        }
        // Handle local paths: \\?\C:\path -> C:\path
        if let Some(stripped) = s.strip_prefix(r"\\?\") {
            return PathBuf::from(stripped);
        }
    }
    path.to_path_buf()
}

/// Canonicalize a path and strip the Windows verbatim prefix.
pub fn canonicalize(path: &Path) -> io::Result<PathBuf> {
    Ok(normalize_path(&std::fs::canonicalize(path)?))
}

/// Join the normal components of a relative path with `/`.
///
/// ```
/// use std::path::Path;
/// use genesys_devserver::fs_utils::to_slash;
///
/// assert_eq!(to_slash(Path::new("assets/models/tree.glb")), "assets/models/tree.glb");
/// assert_eq!(to_slash(Path::new("")), "");
/// ```
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Path of `path` relative to `root`, `/`-separated. `None` if outside the root.
pub fn relative_slash(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(to_slash)
}
