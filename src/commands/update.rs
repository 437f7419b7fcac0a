//! # Update Command Implementation
//!
//! Runs one synchronization pass per mirror:
//!
//! - absent mirrors are cloned;
//! - locked mirrors that are dirty are rinsed, and locked mirrors that fell
//!   behind their remote are pulled, then locked again;
//! - unlocked mirrors with local work are reported and left alone;
//! - a mirror that cannot be restored in place is deleted and recloned.
//!
//! A failure is confined to its own mirror. The command exits non-zero when
//! any mirror is still failed at the end of the pass.

use anyhow::Result;
use clap::Args;

use super::{finish, Context, Remote};
use crate::cli::GlobalArgs;

/// Synchronize mirrors with their remotes
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Only update this mirror
    pub repo: Option<String>,
}

/// Execute the `update` command.
pub fn execute(global: &GlobalArgs, args: UpdateArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::Needed)?;
    let repos = ctx.select(args.repo.as_deref())?;
    let reports = ctx.run_fleet(&repos, "updating", |orchestrator, repo| {
        Ok(orchestrator.update_or_reclone(repo))
    });
    finish(&reports)
}
