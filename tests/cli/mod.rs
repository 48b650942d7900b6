//! CLI subcommand tests against the built binary


use std::path::Path;
use std::process::{Command, Output};

/// Run genesys-devserver with settings isolated from the user's config dir
pub fn run_cli(config_dir: &Path, args: &[&str]) -> Output {
    let config = config_dir.join("config.toml");
    Command::new(env!("CARGO_BIN_EXE_genesys-devserver"))
        .arg("--config")
        .arg(&config)
        .args(args)
        .output()
        .expect("Failed to run genesys-devserver")
}
