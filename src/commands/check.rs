//! # Check Command Implementation
//!
//! Reports, for every mirror, whether it is installed, locked, clean and in
//! step with `origin/<branch>`. Nothing on disk is modified; with `--fetch`
//! the remote-tracking refs are refreshed first so that "up to date" reflects
//! the remote rather than the last fetch.
//!
//! The command exits non-zero when a locked mirror is dirty or diverged,
//! which makes it usable as a CI gate. Unlocked mirrors may hold local work
//! and never fail the check.

use anyhow::Result;
use clap::Args;

use gpack::executor;
use gpack::output;
use gpack::recovery::MirrorStatus;

use super::{Context, Remote};
use crate::cli::GlobalArgs;

/// Report lock and drift state of every mirror
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Fetch from each remote before comparing
    #[arg(long)]
    pub fetch: bool,

    /// Print a JSON array instead of status lines
    #[arg(long)]
    pub json: bool,
}

/// Execute the `check` command.
pub fn execute(global: &GlobalArgs, args: CheckArgs) -> Result<()> {
    let remote = if args.fetch {
        Remote::Needed
    } else {
        Remote::NotNeeded
    };
    let ctx = Context::load(global, remote)?;
    let orchestrator = ctx.orchestrator();

    let statuses: Vec<MirrorStatus> =
        executor::run_over_fleet(&ctx.fleet.repositories, ctx.parallel, |repo| {
            orchestrator.status(repo, args.fetch)
        })
        .into_iter()
        .collect::<gpack::error::Result<_>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        for status in &statuses {
            println!("{}", output::status_line(&ctx.output, status));
        }
    }

    let drifted: Vec<&str> = statuses
        .iter()
        .filter(|s| !s.is_consistent())
        .map(|s| s.name.as_str())
        .collect();
    if !drifted.is_empty() {
        anyhow::bail!(
            "{} locked mirror(s) are dirty or diverged: {}\n\nhint: Run 'gpack update' to restore them",
            drifted.len(),
            drifted.join(", ")
        );
    }
    Ok(())
}
