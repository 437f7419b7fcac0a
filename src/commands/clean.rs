//! # Clean Command Implementation
//!
//! Rinses mirrors: every untracked and ignored file is deleted and the
//! mirror and its submodules are hard-reset to `origin/<branch>`. A locked
//! mirror is unlocked for the rinse and locked again afterwards.

use anyhow::Result;
use clap::Args;

use super::{finish, Context, Remote};
use crate::cli::GlobalArgs;

/// Discard local changes in mirrors
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Only clean this mirror
    pub repo: Option<String>,
}

/// Execute the `clean` command.
pub fn execute(global: &GlobalArgs, args: CleanArgs) -> Result<()> {
    // submodule update may fetch
    let ctx = Context::load(global, Remote::Needed)?;
    let repos = ctx.select(args.repo.as_deref())?;
    let reports = ctx.run_fleet(&repos, "cleaning", |orchestrator, repo| {
        orchestrator.clean(repo)
    });
    finish(&reports)
}
