//! Directory listing command handler

use crate::cli::ListArgs;
use crate::fs_utils;
use crate::listing::Lister;
use crate::paths;
use crate::Result;

use super::{dir_or_current, to_json, CommandContext, CommandStatus};

/// Print the listing of `args.path` under the root, the same JSON as `GET /api/files`.
pub fn run_list(args: &ListArgs, ctx: &CommandContext) -> Result<CommandStatus> {
    let root = fs_utils::canonicalize(&dir_or_current(args.root.as_deref())?)?;
    let dir = paths::resolve_optional(&root, args.path.as_deref())?;

    let lister = Lister::new(root, &ctx.settings.listing);
    let listing = lister.list(&dir, args.recursive)?;

    if ctx.verbose {
        eprintln!(
            "{} directories, {} files",
            listing.directories.len(),
            listing.files.len()
        );
    }
    println!("{}", to_json(&listing)?);
    Ok(CommandStatus::Success)
}
