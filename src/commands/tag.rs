//! # Tag Command Implementation
//!
//! Without a tag, lists the tags of a mirror. With a tag, creates it at HEAD
//! if it does not exist yet and checks it out on a new `build_<tag>` branch.

use anyhow::Result;
use clap::Args;

use gpack::git;
use gpack::suggestions;

use super::{Context, Remote};
use crate::cli::GlobalArgs;

/// List tags, or check out a build branch for a tag
#[derive(Args, Debug)]
pub struct TagArgs {
    /// Mirror name
    pub repo: String,

    /// Tag to check out (created at HEAD when missing)
    pub tag: Option<String>,
}

/// Execute the `tag` command.
pub fn execute(global: &GlobalArgs, args: TagArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::NotNeeded)?;

    let Some(tag) = args.tag else {
        let repo = ctx.find_installed(&args.repo)?;
        let tags = git::list_tags(ctx.runner(), &repo).map_err(suggestions::explain)?;
        println!("Available tags for {}: {}", repo.name, tags.join(", "));
        return Ok(());
    };

    let repo = ctx.find_unlocked(&args.repo)?;
    let tags = git::list_tags(ctx.runner(), &repo).map_err(suggestions::explain)?;
    if !tags.contains(&tag) {
        git::add_tag(ctx.runner(), &repo, &tag).map_err(suggestions::explain)?;
        println!("Created tag {} in {}", tag, repo.name);
    }
    let branch = git::checkout_tag(ctx.runner(), &repo, &tag).map_err(suggestions::explain)?;
    println!("'{}' is now on branch '{}'", repo.name, branch);
    Ok(())
}
