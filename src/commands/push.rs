//! # Push Command Implementation
//!
//! Stages everything in an unlocked mirror, commits it and pushes the current
//! branch to `origin`. Pushing from `master` or from the branch the mirror
//! tracks is refused: those branches are reset to the remote by `update`.

use anyhow::Result;
use clap::Args;

use gpack::git;
use gpack::suggestions;

use super::{Context, Remote};
use crate::cli::GlobalArgs;

/// Commit everything in a mirror and push it
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Mirror name
    pub repo: String,

    /// Commit message
    #[arg(short, long)]
    pub message: String,
}

/// Execute the `push` command.
pub fn execute(global: &GlobalArgs, args: PushArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::Needed)?;
    let repo = ctx.find_unlocked(&args.repo)?;

    let current = git::current_branch(ctx.runner(), &repo.path).map_err(suggestions::explain)?;
    if is_protected(&current, &repo.branch) {
        return Err(suggestions::protected_branch(&repo.name, &current));
    }

    let branch = git::push(ctx.runner(), &repo, &args.message).map_err(suggestions::explain)?;
    println!("Pushed {} to origin/{}", repo.name, branch);
    Ok(())
}

fn is_protected(current: &str, tracked: &str) -> bool {
    current == "master" || current == tracked || current == "HEAD"
}
