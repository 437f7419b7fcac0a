//! # gpack CLI
//!
//! Binary entry point for the `gpack` command-line tool. It parses arguments
//! with `clap`, dispatches to the subcommand, and lets `anyhow` report any
//! error with a non-zero exit code.
//!
//! All mirror logic lives in the `gpack` library crate; the binary only wires
//! configuration, logging and terminal output around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
