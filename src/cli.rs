//! CLI argument parsing and command dispatch

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// gpack - keep a fleet of git mirrors locked, synced and recoverable
#[derive(Parser, Debug)]
#[command(name = "gpack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Flags shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Root directory of the fleet (holds GpackRepos and the lock ledger)
    #[arg(long, global = true, value_name = "DIR", env = "GPACK_ROOT")]
    pub root: Option<PathBuf>,

    /// Path to the GpackRepos file [default: <root>/GpackRepos]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        default_value = "warn",
        env = "GPACK_LOG"
    )]
    pub log_level: String,

    /// Process mirrors one at a time instead of in parallel
    #[arg(long, global = true)]
    pub sequential: bool,

    /// Seconds a single git command may run before it is killed
    #[arg(
        long,
        global = true,
        value_name = "SECS",
        default_value_t = gpack::defaults::DEFAULT_COMMAND_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..),
        env = "GPACK_TIMEOUT"
    )]
    pub timeout: u64,
}

impl GlobalArgs {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone every missing mirror and lock it according to its policy
    Install(commands::install::InstallArgs),

    /// Synchronize mirrors with their remotes, recloning any that cannot be restored
    Update(commands::update::UpdateArgs),

    /// Reset mirrors to their remote branch, discarding local changes
    Clean(commands::clean::CleanArgs),

    /// Make mirrors read-only
    Lock(commands::lock::LockArgs),

    /// Make mirrors writable
    Unlock(commands::lock::LockArgs),

    /// Delete mirrors from disk
    Uninstall(commands::uninstall::UninstallArgs),

    /// Delete and reclone every mirror
    Purge,

    /// Report lock and drift state of every mirror
    Check(commands::check::CheckArgs),

    /// Print the name of every configured mirror
    List,

    /// Add a repository to GpackRepos
    Add(commands::add::AddArgs),

    /// Print the branch checked out in a mirror
    Branch(commands::branch::BranchArgs),

    /// Check out (or create) a branch in a mirror
    Checkout(commands::branch::CheckoutArgs),

    /// List tags, or check out a build branch for a tag
    Tag(commands::tag::TagArgs),

    /// Commit everything in a mirror and push it
    Push(commands::push::PushArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.global.log_level);
        let global = self.global;

        match self.command {
            Commands::Install(args) => commands::install::execute(&global, args),
            Commands::Update(args) => commands::update::execute(&global, args),
            Commands::Clean(args) => commands::clean::execute(&global, args),
            Commands::Lock(args) => commands::lock::execute_lock(&global, args),
            Commands::Unlock(args) => commands::lock::execute_unlock(&global, args),
            Commands::Uninstall(args) => commands::uninstall::execute(&global, args),
            Commands::Purge => commands::uninstall::execute_purge(&global),
            Commands::Check(args) => commands::check::execute(&global, args),
            Commands::List => commands::list::execute(&global),
            Commands::Add(args) => commands::add::execute(&global, args),
            Commands::Branch(args) => commands::branch::execute_branch(&global, args),
            Commands::Checkout(args) => commands::branch::execute_checkout(&global, args),
            Commands::Tag(args) => commands::tag::execute(&global, args),
            Commands::Push(args) => commands::push::execute(&global, args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Routes the `log` facade to stderr at the requested level.
fn init_logging(level: &str) {
    let filter = level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Warn);
    // a logger may already be installed when the CLI is driven from tests
    let _ = env_logger::Builder::new()
        .filter_level(filter)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
