//! genesys-devserver CLI entry point

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use genesys_devserver::cli::{Cli, Commands};
use genesys_devserver::commands::{self, CommandContext, CommandStatus};
use genesys_devserver::{FileServerError, Settings};

fn main() -> ExitCode {
    match run() {
        Ok(CommandStatus::Success) => ExitCode::SUCCESS,
        Ok(CommandStatus::Failure) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<FileServerError>() {
                Some(err) => err.exit_code(),
                None => ExitCode::FAILURE,
            }
        }
    }
}

fn run() -> anyhow::Result<CommandStatus> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::load().context("loading settings")?,
    };
    init_tracing(&settings, cli.verbose)?;

    let ctx = CommandContext {
        settings,
        verbose: cli.verbose,
    };

    let status = match &cli.command {
        Commands::Serve(args) => {
            let runtime = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
            runtime.block_on(commands::run_serve(args, &ctx))?
        }
        Commands::Build(args) => commands::run_build(args, &ctx)?,
        Commands::List(args) => commands::run_list(args, &ctx)?,
    };
    Ok(status)
}

/// Log to stderr; stdout carries command output.
fn init_tracing(settings: &Settings, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        "debug"
    } else {
        settings.logging.level.as_str()
    };
    let directive: Directive = format!("genesys_devserver={}", level)
        .parse()
        .with_context(|| format!("invalid log level {:?}", level))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}
