//! File system watcher feeding the change broadcaster
//!
//! Uses the `notify` crate to watch the served root recursively and turn raw
//! notifications into [`ChangeEvent`]s for the [`WsHub`].
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌─────────┐
//! │   notify    │────>│ ChangeClassifier │────>│  WsHub  │
//! │   watcher   │     │  (known dirs)    │     │         │
//! └─────────────┘     └──────────────────┘     └─────────┘
//! ```
//!
//! Events are forwarded as they arrive; bursts are not coalesced. Platforms
//! that do not say whether a removed path was a file or a folder are handled
//! by remembering which directories exist under the root.
//!
//! A folder can fill up before notify starts watching it, so a created folder
//! is scanned and everything already inside it is reported as created. Paths
//! found that way are remembered so a late notification for them is dropped.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::events::ServerLog;
use crate::fs_utils;
use crate::schema::{ChangeAction, ChangeEvent, EntryKind};
use crate::{FileServerError, Result};

use super::hub::WsHub;

/// Maps raw notify events to change events relative to a root
pub struct ChangeClassifier {
    root: PathBuf,
    known_dirs: HashSet<PathBuf>,
    /// Files reported by a folder scan whose own create event may still arrive
    scanned_files: HashSet<PathBuf>,
}

impl ChangeClassifier {
    /// Create a classifier for `root`, seeding the known directories with a walk.
    pub fn new(root: PathBuf) -> Self {
        let mut known_dirs = HashSet::new();
        seed_dirs(&root, &mut known_dirs);
        Self {
            root,
            known_dirs,
            scanned_files: HashSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_known_dir(&self, path: &Path) -> bool {
        self.known_dirs.contains(path)
    }

    /// Classify one notification. Returns zero or more changes in order.
    pub fn classify(&mut self, event: &Event) -> Vec<ChangeEvent> {
        let mut changes = Vec::new();

        match &event.kind {
            EventKind::Create(kind) => {
                for path in &event.paths {
                    let entry = match kind {
                        CreateKind::File => EntryKind::File,
                        CreateKind::Folder => EntryKind::Folder,
                        CreateKind::Any | CreateKind::Other => stat_kind(path),
                    };
                    self.push_created(&mut changes, path, entry);
                }
            }

            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => {
                    for path in &event.paths {
                        self.push_deleted(&mut changes, path, None);
                    }
                }
                RenameMode::To => {
                    for path in &event.paths {
                        self.push_created(&mut changes, path, stat_kind(path));
                    }
                }
                RenameMode::Both => {
                    if let [from, to, ..] = event.paths.as_slice() {
                        let moved = self.forget(from);
                        self.push_deleted(&mut changes, from, Some(moved));
                        let entry = if moved == EntryKind::Folder || to.is_dir() {
                            EntryKind::Folder
                        } else {
                            EntryKind::File
                        };
                        self.push_created(&mut changes, to, entry);
                    }
                }
                RenameMode::Any | RenameMode::Other => {
                    for path in &event.paths {
                        if path.exists() {
                            self.push_created(&mut changes, path, stat_kind(path));
                        } else {
                            self.push_deleted(&mut changes, path, None);
                        }
                    }
                }
            },

            EventKind::Modify(_) => {
                for path in &event.paths {
                    // Directory timestamps change with their contents
                    if self.known_dirs.contains(path) || path.is_dir() {
                        continue;
                    }
                    self.scanned_files.remove(path);
                    if let Some(relative) = self.relative(path) {
                        changes.push(ChangeEvent::new(
                            EntryKind::File,
                            relative,
                            ChangeAction::Modified,
                        ));
                    }
                }
            }

            EventKind::Remove(kind) => {
                for path in &event.paths {
                    let entry = match kind {
                        RemoveKind::File => {
                            self.forget(path);
                            Some(EntryKind::File)
                        }
                        RemoveKind::Folder => {
                            self.forget(path);
                            Some(EntryKind::Folder)
                        }
                        RemoveKind::Any | RemoveKind::Other => None,
                    };
                    self.push_deleted(&mut changes, path, entry);
                }
            }

            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }

        changes
    }

    fn relative(&self, path: &Path) -> Option<String> {
        fs_utils::relative_slash(&self.root, path).filter(|rel| !rel.is_empty())
    }

    fn push_created(&mut self, changes: &mut Vec<ChangeEvent>, path: &Path, entry: EntryKind) {
        let Some(relative) = self.relative(path) else {
            return;
        };
        match entry {
            EntryKind::Folder => {
                // Already reported by a scan of its parent
                if !self.known_dirs.insert(path.to_path_buf()) {
                    return;
                }
                changes.push(ChangeEvent::new(entry, relative, ChangeAction::Created));
                self.scan_new_dir(changes, path);
            }
            EntryKind::File => {
                if self.scanned_files.remove(path) {
                    return;
                }
                changes.push(ChangeEvent::new(entry, relative, ChangeAction::Created));
            }
        }
    }

    /// Report the contents of a folder that just appeared, parents first.
    fn scan_new_dir(&mut self, changes: &mut Vec<ChangeEvent>, dir: &Path) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let mut entries: Vec<_> = entries.flatten().collect();
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let Some(relative) = self.relative(&path) else {
                continue;
            };
            // Symlinks are not followed
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                if self.known_dirs.insert(path.clone()) {
                    changes.push(ChangeEvent::new(
                        EntryKind::Folder,
                        relative,
                        ChangeAction::Created,
                    ));
                    self.scan_new_dir(changes, &path);
                }
            } else if self.scanned_files.insert(path) {
                changes.push(ChangeEvent::new(
                    EntryKind::File,
                    relative,
                    ChangeAction::Created,
                ));
            }
        }
    }

    /// Push a deletion. Without a reported kind the known directories decide.
    fn push_deleted(
        &mut self,
        changes: &mut Vec<ChangeEvent>,
        path: &Path,
        entry: Option<EntryKind>,
    ) {
        let Some(relative) = self.relative(path) else {
            return;
        };
        let entry = match entry {
            Some(entry) => entry,
            None => self.forget(path),
        };
        changes.push(ChangeEvent::new(entry, relative, ChangeAction::Deleted));
    }

    /// Drop `path` and everything below it from the known directories.
    fn forget(&mut self, path: &Path) -> EntryKind {
        self.scanned_files.retain(|file| !file.starts_with(path));
        let was_dir = self.known_dirs.remove(path);
        if was_dir {
            self.known_dirs.retain(|dir| !dir.starts_with(path));
            EntryKind::Folder
        } else {
            EntryKind::File
        }
    }
}

fn stat_kind(path: &Path) -> EntryKind {
    if path.is_dir() {
        EntryKind::Folder
    } else {
        EntryKind::File
    }
}

/// Record every directory below `dir`. Symlinks are not followed.
fn seed_dirs(dir: &Path, known: &mut HashSet<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            let path = entry.path();
            if known.insert(path.clone()) {
                seed_dirs(&path, known);
            }
        }
    }
}

/// Handle for a running watcher. Dropping it stops watching.
pub struct WatcherHandle {
    watcher: Option<RecommendedWatcher>,
    root: PathBuf,
}

impl WatcherHandle {
    /// Stop the watcher
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.root) {
                tracing::debug!("Failed to unwatch {}: {}", self.root.display(), e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start watching `root` recursively and publish every change on `hub`.
///
/// `root` must be canonical so event paths can be made relative to it.
pub fn watch(root: &Path, hub: Arc<WsHub>, log: ServerLog) -> Result<WatcherHandle> {
    let mut classifier = ChangeClassifier::new(root.to_path_buf());
    let handler_log = log.clone();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            tracing::trace!("Watcher event {:?} for {:?}", event.kind, event.paths);
            for change in classifier.classify(&event) {
                tracing::debug!("{:?} {:?} {}", change.action, change.kind, change.path);
                hub.broadcast(&change);
            }
        }
        Err(e) => handler_log.error(format!("Watcher error: {}", e)),
    })
    .map_err(|e| FileServerError::Watcher {
        message: e.to_string(),
    })?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| FileServerError::Watcher {
            message: format!("cannot watch {}: {}", root.display(), e),
        })?;

    log.debug(format!("Watching {}", root.display()));
    Ok(WatcherHandle {
        watcher: Some(watcher),
        root: root.to_path_buf(),
    })
}
