//! File server command handler
//!
//! Starts a [`FileServer`] on the requested root and port, then waits for
//! Ctrl-C and stops it gracefully.

use crate::cli::ServeArgs;
use crate::server::FileServer;
use crate::Result;

use super::{dir_or_current, CommandContext, CommandStatus};

pub async fn run_serve(args: &ServeArgs, ctx: &CommandContext) -> Result<CommandStatus> {
    let root = dir_or_current(args.root.as_deref())?;
    let port = args.port.unwrap_or(ctx.settings.server.port);

    tracing::info!(
        "Starting genesys-devserver v{}",
        env!("CARGO_PKG_VERSION")
    );
    let server = FileServer::new(ctx.settings.clone());
    server.start(port, &root).await?;

    if let Some(addr) = server.local_addr() {
        tracing::info!("Listening on http://{}", addr);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }

    tracing::info!("Shutting down");
    server.stop().await;
    Ok(CommandStatus::Success)
}
