//! # Install Command Implementation
//!
//! Clones every mirror that is not on disk yet, in parallel, and locks it
//! when its `lock` policy is set. Mirrors that already exist are left as they
//! are; use `update` to synchronize them.

use anyhow::Result;
use clap::Args;

use super::{finish, Context, Remote};
use crate::cli::GlobalArgs;

/// Clone missing mirrors
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Only install this mirror
    pub repo: Option<String>,
}

/// Execute the `install` command.
pub fn execute(global: &GlobalArgs, args: InstallArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::Needed)?;
    let repos = ctx.select(args.repo.as_deref())?;
    let reports = ctx.run_fleet(&repos, "installing", |orchestrator, repo| {
        orchestrator.install(repo)
    });
    finish(&reports)
}
