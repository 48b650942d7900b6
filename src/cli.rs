//! CLI argument definitions using clap with subcommand architecture

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Local file server for Genesys game projects
#[derive(Parser, Debug)]
#[command(name = "genesys-devserver")]
#[command(about = "Serve a Genesys project directory over HTTP with live change notifications")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (default: <config dir>/genesys-devserver/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================
// Main Commands Enum
// ============================================

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve a project directory until interrupted
    #[command(visible_alias = "s")]
    Serve(ServeArgs),

    /// Build a project into its .dist folder
    #[command(visible_alias = "b")]
    Build(BuildArgs),

    /// Print a directory listing as JSON
    #[command(visible_alias = "ls")]
    List(ListArgs),
}

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Project directory to serve (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Port to listen on (default: from settings, 4000)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Project directory containing game.ts and default.scene.json
    #[arg(value_name = "PROJECT")]
    pub project: Option<PathBuf>,
}

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Path relative to the root (default: the root itself)
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Root directory (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Walk the whole subtree
    #[arg(short = 'R', long)]
    pub recursive: bool,
}
