//! # Uninstall and Purge Command Implementations
//!
//! `uninstall` deletes mirrors from disk (restoring write permission first so
//! that locked trees can be removed) and drops them from the lock ledger.
//! `purge` uninstalls the whole fleet and installs it again from scratch.

use anyhow::Result;
use clap::Args;

use super::{finish, Context, Remote};
use crate::cli::GlobalArgs;

/// Delete mirrors from disk
#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Only uninstall this mirror
    pub repo: Option<String>,
}

/// Execute the `uninstall` command.
pub fn execute(global: &GlobalArgs, args: UninstallArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::NotNeeded)?;
    let repos = ctx.select(args.repo.as_deref())?;
    let reports = ctx.run_fleet(&repos, "removing", |orchestrator, repo| {
        orchestrator.uninstall(repo)
    });
    finish(&reports)
}

/// Execute the `purge` command.
pub fn execute_purge(global: &GlobalArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::Needed)?;
    let repos = ctx.select(None)?;

    let removed = ctx.run_fleet(&repos, "removing", |orchestrator, repo| {
        orchestrator.uninstall(repo)
    });
    finish(&removed)?;

    let installed = ctx.run_fleet(&repos, "installing", |orchestrator, repo| {
        orchestrator.install(repo)
    });
    finish(&installed)
}
