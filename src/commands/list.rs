//! `list`: print the name of every configured mirror, one per line.

use anyhow::Result;

use super::{Context, Remote};
use crate::cli::GlobalArgs;

/// Execute the `list` command.
pub fn execute(global: &GlobalArgs) -> Result<()> {
    let ctx = Context::load(global, Remote::NotNeeded)?;
    for name in ctx.fleet.names() {
        println!("{}", name);
    }
    Ok(())
}
