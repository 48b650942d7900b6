//! Wire types shared by the HTTP API, the WebSocket hub and the host interface

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file or directory produced by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    /// Relative to the served root, `/`-separated
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

/// Result of `GET /api/files`
///
/// Entries keep directory-enumeration order: stable for one call, not sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub directories: Vec<FileEntry>,
    pub files: Vec<FileEntry>,
}

impl DirectoryListing {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Modified,
    Deleted,
}

/// Filesystem change pushed to every WebSocket client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: EntryKind,
    pub path: String,
    pub action: ChangeAction,
}

impl ChangeEvent {
    pub fn new(kind: EntryKind, path: impl Into<String>, action: ChangeAction) -> Self {
        Self {
            kind,
            path: path.into(),
            action,
        }
    }
}

/// Lifecycle phase of a `FileServer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerPhase {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Snapshot returned by `FileServer::status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub is_running: bool,
    pub port: u16,
    pub root_directory: Option<PathBuf>,
    pub phase: ServerPhase,
}

/// Outcome of a project build, relayed verbatim by `POST /api/build-project`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: None,
        }
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub path: Option<String>,
    #[serde(default)]
    pub recursive: Option<String>,
}

impl ListQuery {
    pub fn is_recursive(&self) -> bool {
        self.recursive.as_deref() == Some("true")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteFileRequest {
    pub path: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecRequest {
    pub command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResponse {
    pub success: bool,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResponse {
    pub success: bool,
    pub command: String,
}
