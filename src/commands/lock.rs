//! `lock` and `unlock`: record the change in the lock ledger and project it
//! onto the mirror's file permissions.

use anyhow::Result;
use clap::Args;

use super::{finish, Context, Remote};
use crate::cli::GlobalArgs;

/// Select the mirrors to lock or unlock
#[derive(Args, Debug)]
pub struct LockArgs {
    /// Only this mirror (default: every mirror)
    pub repo: Option<String>,
}

/// Execute the `lock` command.
pub fn execute_lock(global: &GlobalArgs, args: LockArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::NotNeeded)?;
    let repos = ctx.select(args.repo.as_deref())?;
    let reports = ctx.run_fleet(&repos, "locking", |orchestrator, repo| {
        orchestrator.lock_mirror(repo)
    });
    finish(&reports)
}

/// Execute the `unlock` command.
pub fn execute_unlock(global: &GlobalArgs, args: LockArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::NotNeeded)?;
    let repos = ctx.select(args.repo.as_deref())?;
    let reports = ctx.run_fleet(&repos, "unlocking", |orchestrator, repo| {
        orchestrator.unlock_mirror(repo)
    });
    finish(&reports)
}
