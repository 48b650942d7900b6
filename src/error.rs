//! Error types and exit codes for genesys-devserver

use std::net::SocketAddr;
use std::process::ExitCode;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Main error type for file server operations
#[derive(Error, Debug)]
pub enum FileServerError {
    #[error("{message}")]
    BadRequest { message: String },

    #[error("File or directory not found: {path}")]
    NotFound { path: String },

    #[error("Failed to bind {addr}: {source}")]
    PortBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {command}: {message}")]
    Exec { command: String, message: String },

    #[error("Watcher error: {message}")]
    Watcher { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileServerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// HTTP status returned by the API for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::PortBind { .. }
            | Self::Exec { .. }
            | Self::Watcher { .. }
            | Self::InvalidConfig { .. }
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert error to exit code for the CLI:
    /// - 1: IO / not found
    /// - 2: bad request / invalid configuration
    /// - 3: port bind failure
    /// - 4: command or watcher failure
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) | Self::NotFound { .. } => ExitCode::from(1),
            Self::BadRequest { .. } | Self::InvalidConfig { .. } => ExitCode::from(2),
            Self::PortBind { .. } => ExitCode::from(3),
            Self::Exec { .. } | Self::Watcher { .. } => ExitCode::from(4),
        }
    }
}

impl IntoResponse for FileServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type alias for file server operations
pub type Result<T> = std::result::Result<T, FileServerError>;
