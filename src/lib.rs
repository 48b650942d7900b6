//! genesys-devserver: local file server for Genesys game projects
//!
//! Serves a project directory over HTTP (file listing, writes, uploads,
//! deletes, project builds and shell commands), serves the files themselves as
//! static content, and broadcasts filesystem changes to WebSocket clients on
//! the same port.
//!
//! # Example
//!
//! ```no_run
//! use genesys_devserver::{FileServer, Settings};
//!
//! # async fn run() -> genesys_devserver::Result<()> {
//! let server = FileServer::new(Settings::load()?);
//! server.start(4000, "/home/me/games/platformer").await?;
//! println!("{:?}", server.status());
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod exec;
pub mod fs_utils;
pub mod listing;
pub mod paths;
pub mod schema;
pub mod server;

// Re-export commonly used types
pub use builder::{BundlerProjectBuilder, ProjectBuilder};
pub use config::{ServerConfig, Settings, DEFAULT_PORT};
pub use error::{FileServerError, Result};
pub use events::{LogEntry, LogLevel, ServerLog};
pub use listing::Lister;
pub use schema::{
    BuildOutcome, ChangeAction, ChangeEvent, DirectoryListing, EntryKind, FileEntry, ServerPhase,
    ServerStatus,
};
pub use server::FileServer;
