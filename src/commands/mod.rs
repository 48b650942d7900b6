//! Command modules for the genesys-devserver CLI
//!
//! Each command module implements a single top-level command:
//! - `serve` - Run the file server until Ctrl-C
//! - `build` - Run the project builder once
//! - `list` - Print a directory listing
//!
//! All command handlers take their respective `Args` struct from `cli.rs`
//! and a shared `CommandContext`.

pub mod build;
pub mod list;
pub mod serve;

pub use build::run_build;
pub use list::run_list;
pub use serve::run_serve;

use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::Result;

/// Shared context passed to all command handlers
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    pub settings: Settings,
    pub verbose: bool,
}

/// Exit status of a command that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure,
}

/// `dir` or the current directory
pub(crate) fn dir_or_current(dir: Option<&Path>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(std::env::current_dir()?),
    }
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| crate::FileServerError::Io(std::io::Error::other(e)))
}
