//! Project build command handler

use crate::builder::{BundlerProjectBuilder, ProjectBuilder};
use crate::cli::BuildArgs;
use crate::Result;

use super::{dir_or_current, to_json, CommandContext, CommandStatus};

/// Build the project and print the outcome as JSON.
pub fn run_build(args: &BuildArgs, ctx: &CommandContext) -> Result<CommandStatus> {
    let project = dir_or_current(args.project.as_deref())?;
    let builder = BundlerProjectBuilder::new(&ctx.settings.build);
    let outcome = builder.build(&project);

    println!("{}", to_json(&outcome)?);
    Ok(if outcome.success {
        CommandStatus::Success
    } else {
        CommandStatus::Failure
    })
}
