//! # Add Command Implementation
//!
//! Appends a repository entry to `GpackRepos`, creating the file when the
//! fleet is new. The entry is named after the last segment of its directory
//! unless `--name` is given. Nothing is cloned; run `gpack install` next.

use anyhow::Result;
use clap::Args;
use std::path::Path;

use gpack::config::{self, RepoEntry};
use gpack::suggestions;

use super::{resolve_config, resolve_root};
use crate::cli::GlobalArgs;

/// Add a repository to GpackRepos
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Remote to clone from
    pub url: String,

    /// Directory of the mirror, relative to the root
    pub dir: String,

    /// Branch the mirror tracks
    pub branch: String,

    /// Entry name (default: last segment of the directory)
    #[arg(long)]
    pub name: Option<String>,

    /// Keep the mirror writable after install
    #[arg(long)]
    pub no_lock: bool,
}

/// Execute the `add` command.
pub fn execute(global: &GlobalArgs, args: AddArgs) -> Result<()> {
    let root = resolve_root(global)?;
    let config_path = resolve_config(global, &root);

    let name = match args.name {
        Some(name) => name,
        None => default_name(&args.dir)?,
    };
    let entry = RepoEntry {
        url: args.url,
        local_dir: args.dir,
        branch: args.branch,
        lock: if args.no_lock { Some(false) } else { None },
    };

    let created = !config_path.exists();
    config::append_entry(&root, &config_path, &name, &entry).map_err(suggestions::explain)?;

    if created {
        println!("Created {} with {}", config_path.display(), name);
    } else {
        println!("Added {} to {}", name, config_path.display());
    }
    println!("Run 'gpack install' to clone it");
    Ok(())
}

fn default_name(dir: &str) -> Result<String> {
    Path::new(dir)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("Cannot derive a name from '{}'\n\nhint: Pass --name", dir))
}
