//! # CLI Command Implementations
//!
//! One module per subcommand. Each module holds an `Args` struct derived with
//! `clap` and an `execute` function that calls into the `gpack` library.
//!
//! Commands share a [`Context`]: the fleet read from `GpackRepos`, the lock
//! ledger of the root directory and the git runner, configured with the
//! fleet's SSH key when the command talks to remotes.

pub mod add;
pub mod branch;
pub mod check;
pub mod clean;
pub mod completions;
pub mod install;
pub mod list;
pub mod lock;
pub mod push;
pub mod tag;
pub mod uninstall;
pub mod update;

use std::path::{Path, PathBuf};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use gpack::config::{self, Fleet};
use gpack::defaults;
use gpack::error::Error;
use gpack::executor;
use gpack::git::SystemGit;
use gpack::keys::{self, KeyGuard};
use gpack::ledger::LockLedger;
use gpack::output::{self, OutputConfig};
use gpack::recovery::{MirrorReport, Orchestrator};
use gpack::repository::Repository;
use gpack::runner::CommandRunner;
use gpack::suggestions;

use crate::cli::GlobalArgs;

/// Whether a command needs the fleet's SSH key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remote {
    Needed,
    NotNeeded,
}

/// Everything a command needs to act on the fleet.
pub struct Context {
    pub fleet: Fleet,
    pub ledger: LockLedger,
    pub git: SystemGit,
    pub output: OutputConfig,
    pub parallel: bool,
    // dropped last: removes the downloaded key
    _key: Option<KeyGuard>,
}

impl Context {
    /// Resolves the root, loads `GpackRepos` and prepares the git runner.
    pub fn load(global: &GlobalArgs, remote: Remote) -> Result<Self> {
        let root = resolve_root(global)?;
        let config_path = resolve_config(global, &root);
        if !config_path.exists() {
            return Err(suggestions::config_not_found(&config_path));
        }
        let fleet = config::from_file(&root, &config_path).map_err(suggestions::explain)?;

        let mut runner = CommandRunner::new().with_timeout(global.command_timeout());
        let key = match (&fleet.key_url, remote) {
            (Some(url), Remote::Needed) => {
                let guard = keys::install(&root, url).map_err(suggestions::explain)?;
                runner = guard.configure(runner);
                Some(guard)
            }
            _ => None,
        };

        Ok(Self {
            ledger: LockLedger::new(defaults::ledger_path(&root)),
            git: SystemGit::new(runner),
            output: OutputConfig::from_env_and_flag(&global.color),
            parallel: !global.sequential,
            fleet,
            _key: key,
        })
    }

    pub fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(&self.git, &self.ledger)
    }

    pub fn runner(&self) -> &CommandRunner {
        self.git.runner()
    }

    /// The named mirror, or the whole fleet.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<Repository>> {
        self.fleet.select(name).map_err(|e| self.explain(e))
    }

    pub fn find(&self, name: &str) -> Result<Repository> {
        self.fleet
            .find(name)
            .cloned()
            .map_err(|e| self.explain(e))
    }

    /// A mirror that must be on disk and writable.
    pub fn find_unlocked(&self, name: &str) -> Result<Repository> {
        let repo = self.find_installed(name)?;
        if self.ledger.is_locked(&repo).map_err(suggestions::explain)? {
            return Err(suggestions::mirror_locked(&repo.name));
        }
        Ok(repo)
    }

    /// A mirror that must be on disk.
    pub fn find_installed(&self, name: &str) -> Result<Repository> {
        let repo = self.find(name)?;
        if !repo.exists() {
            return Err(suggestions::explain(Error::MissingMirror {
                name: repo.name,
                path: repo.path,
            }));
        }
        Ok(repo)
    }

    fn explain(&self, error: Error) -> anyhow::Error {
        match error {
            Error::UnknownRepository { name, .. } => {
                suggestions::unknown_repository(&name, &self.fleet.names())
            }
            other => suggestions::explain(other),
        }
    }

    /// Runs `op` over `repos`, printing each mirror's status lines as it
    /// finishes.
    pub fn run_fleet<F>(&self, repos: &[Repository], message: &str, op: F) -> Vec<MirrorReport>
    where
        F: Fn(&Orchestrator<'_>, &Repository) -> gpack::error::Result<MirrorReport> + Sync + Send,
    {
        let orchestrator = self.orchestrator();
        let bar = progress_bar(repos.len() as u64, message);

        let results = executor::run_over_fleet(repos, self.parallel, |repo| {
            let report = op(&orchestrator, repo).unwrap_or_else(|e| MirrorReport::failed(repo, &e));
            self.print_report(&bar, &report);
            bar.inc(1);
            Ok(report)
        });

        let reports: Vec<MirrorReport> = results
            .into_iter()
            .zip(repos)
            .map(|(result, repo)| {
                result.unwrap_or_else(|e| {
                    let report = MirrorReport::failed(repo, &e);
                    self.print_report(&bar, &report);
                    report
                })
            })
            .collect();
        bar.finish_and_clear();
        reports
    }

    fn print_report(&self, bar: &ProgressBar, report: &MirrorReport) {
        for line in output::report_lines(&self.output, report) {
            if bar.is_hidden() {
                println!("{}", line);
            } else {
                bar.println(line);
            }
        }
    }
}

/// Prints the summary and fails when any mirror failed.
pub fn finish(reports: &[MirrorReport]) -> Result<()> {
    println!("{}", output::summary_line(reports));
    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| r.is_failed())
        .map(|r| r.name.as_str())
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("{} mirror(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

/// Root from `--root`/`GPACK_ROOT`, else the working directory, made
/// absolute.
pub fn resolve_root(global: &GlobalArgs) -> Result<PathBuf> {
    let root = match &global.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    Ok(std::path::absolute(root)?)
}

pub fn resolve_config(global: &GlobalArgs, root: &Path) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(|| defaults::config_path(root))
}

fn progress_bar(len: u64, message: &str) -> ProgressBar {
    if len < 2 || !console::Term::stdout().is_term() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(message.to_string());
    bar
}
