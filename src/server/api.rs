//! HTTP file API
//!
//! Routes under `/api` operate on paths relative to the served root. Anything
//! else falls through to static file serving from the root. Every error body
//! is `{ "error": message }` (see [`FileServerError`]'s `IntoResponse`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::builder::ProjectBuilder;
use crate::config::Settings;
use crate::events::{LogEntry, ServerLog};
use crate::exec;
use crate::fs_utils;
use crate::listing::Lister;
use crate::paths;
use crate::schema::{
    BuildOutcome, DirectoryListing, ExecRequest, ExecResponse, ListQuery, PathQuery,
    PathResponse, UploadResponse, WriteFileRequest,
};
use crate::{FileServerError, Result};

/// Header naming the upload destination directory
pub const UPLOAD_PATH_HEADER: &str = "x-upload-path";

/// Shared state of every API handler
#[derive(Clone)]
pub struct ApiState {
    pub root: Arc<PathBuf>,
    pub lister: Arc<Lister>,
    pub builder: Arc<dyn ProjectBuilder>,
    pub log: ServerLog,
}

impl ApiState {
    pub fn new(
        root: PathBuf,
        settings: &Settings,
        builder: Arc<dyn ProjectBuilder>,
        log: ServerLog,
    ) -> Self {
        Self {
            lister: Arc::new(Lister::new(root.clone(), &settings.listing)),
            root: Arc::new(root),
            builder,
            log,
        }
    }
}

/// Build the API router with static fallback, CORS, tracing and body limit.
pub fn router(state: ApiState, settings: &Settings) -> Router {
    let static_files = ServeDir::new(state.root.as_path());

    Router::new()
        .route(
            "/api/files",
            get(list_files).post(write_file).delete(delete_file),
        )
        .route("/api/files/upload", post(upload_file))
        .route("/api/exec", post(exec_command))
        .route("/api/build-project", post(build_project))
        .route("/api/logs", get(logs))
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(settings.server.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_files(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<DirectoryListing>> {
    let dir = paths::resolve_optional(&state.root, query.path.as_deref())?;
    let recursive = query.is_recursive();
    let lister = Arc::clone(&state.lister);

    let listing = tokio::task::spawn_blocking(move || lister.list(&dir, recursive))
        .await
        .map_err(join_error)??;
    Ok(Json(listing))
}

async fn write_file(
    State(state): State<ApiState>,
    body: std::result::Result<Json<WriteFileRequest>, JsonRejection>,
) -> Result<Json<PathResponse>> {
    let Json(request) = body.map_err(|e| FileServerError::bad_request(e.body_text()))?;
    let relative = match request.path {
        Some(path) if !path.is_empty() => path,
        _ => return Err(FileServerError::bad_request("File path is required")),
    };

    let target = paths::resolve_within_root(&state.root, &relative)?;
    if target == *state.root {
        return Err(FileServerError::bad_request("File path is required"));
    }
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, request.content.unwrap_or_default()).await?;

    state.log.info(format!("File updated: {}", target.display()));
    Ok(Json(PathResponse {
        success: true,
        path: relative,
    }))
}

async fn upload_file(
    State(state): State<ApiState>,
    headers: HeaderMap,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| FileServerError::bad_request(e.body_text()))?;
    let upload_path = headers
        .get(UPLOAD_PATH_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let dest_dir = paths::resolve_within_root(&state.root, &upload_path)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FileServerError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = match field.file_name().and_then(upload_file_name) {
            Some(name) => name,
            None => continue,
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| FileServerError::bad_request(e.body_text()))?;

        tokio::fs::create_dir_all(&dest_dir).await?;
        let target = dest_dir.join(&filename);
        tokio::fs::write(&target, &data).await?;

        let relative = fs_utils::to_slash(&Path::new(&upload_path).join(&filename));
        state.log.info(format!("File uploaded: {}", target.display()));
        return Ok(Json(UploadResponse {
            success: true,
            filename,
            path: relative,
        }));
    }

    Err(FileServerError::bad_request("No file uploaded"))
}

/// Final component of a client supplied file name, either separator style.
fn upload_file_name(original: &str) -> Option<String> {
    original
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
}

async fn delete_file(
    State(state): State<ApiState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<PathResponse>> {
    let relative = match query.path {
        Some(path) if !path.is_empty() => path,
        _ => return Err(FileServerError::bad_request("Path is required")),
    };

    let target = paths::resolve_within_root(&state.root, &relative)?;
    if target == *state.root {
        return Err(FileServerError::bad_request(
            "Refusing to delete the project root",
        ));
    }

    let metadata = match tokio::fs::symlink_metadata(&target).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FileServerError::NotFound { path: relative });
        }
        Err(e) => return Err(e.into()),
    };
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(&target).await?;
    } else {
        tokio::fs::remove_file(&target).await?;
    }

    state.log.info(format!("File deleted: {}", target.display()));
    Ok(Json(PathResponse {
        success: true,
        path: relative,
    }))
}

async fn exec_command(
    State(state): State<ApiState>,
    body: std::result::Result<Json<ExecRequest>, JsonRejection>,
) -> Result<Json<ExecResponse>> {
    let Json(request) = body.map_err(|e| FileServerError::bad_request(e.body_text()))?;
    let command = match request.command {
        Some(command) if !command.is_empty() => command,
        _ => return Err(FileServerError::bad_request("No command provided")),
    };

    state.log.info(format!("Executing command: {}", command));
    if let Err(e) = exec::run_shell_command(&command).await {
        state.log.error(e.to_string());
        return Err(e);
    }
    state.log.info(format!("Command executed: {}", command));

    Ok(Json(ExecResponse {
        success: true,
        command,
    }))
}

async fn build_project(State(state): State<ApiState>) -> Result<Json<BuildOutcome>> {
    let builder = Arc::clone(&state.builder);
    let root = Arc::clone(&state.root);

    let outcome = tokio::task::spawn_blocking(move || builder.build(&root))
        .await
        .map_err(join_error)?;
    if outcome.success {
        state.log.info(outcome.message.clone());
    } else {
        state.log.error(outcome.message.clone());
    }
    Ok(Json(outcome))
}

async fn logs(State(state): State<ApiState>) -> Json<Vec<LogEntry>> {
    Json(state.log.history())
}

fn join_error(e: tokio::task::JoinError) -> FileServerError {
    FileServerError::Io(std::io::Error::other(e.to_string()))
}
