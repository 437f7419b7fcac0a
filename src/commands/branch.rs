//! `branch` and `checkout`: inspect or switch the branch of one mirror.
//!
//! Switching branches rewrites the working tree, so `checkout` requires the
//! mirror to be unlocked.

use anyhow::Result;
use clap::Args;

use gpack::git;
use gpack::suggestions;

use super::{Context, Remote};
use crate::cli::GlobalArgs;

/// Print the branch checked out in a mirror
#[derive(Args, Debug)]
pub struct BranchArgs {
    /// Mirror name
    pub repo: String,
}

/// Check out a branch in a mirror
#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Mirror name
    pub repo: String,

    /// Branch to check out
    pub branch: String,

    /// Create the branch when it does not exist
    #[arg(long, short = 'b')]
    pub create: bool,
}

/// Execute the `branch` command.
pub fn execute_branch(global: &GlobalArgs, args: BranchArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::NotNeeded)?;
    let repo = ctx.find_installed(&args.repo)?;
    let branch = git::current_branch(ctx.runner(), &repo.path).map_err(suggestions::explain)?;
    println!("'{}' is currently on branch '{}'", repo.name, branch);
    Ok(())
}

/// Execute the `checkout` command.
pub fn execute_checkout(global: &GlobalArgs, args: CheckoutArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::NotNeeded)?;
    let repo = ctx.find_unlocked(&args.repo)?;
    git::checkout_branch(ctx.runner(), &repo, &args.branch, args.create)
        .map_err(suggestions::explain)?;
    println!("'{}' is now on branch '{}'", repo.name, args.branch);
    Ok(())
}
