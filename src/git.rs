//! # Git Command Protocol
//!
//! Every git invocation gpack makes lives in this module. Each function takes
//! the [`CommandRunner`] and the mirror it acts on, and runs its commands
//! with the mirror's directory as the working directory.
//!
//! The [`GitOperations`] trait is the seam the recovery orchestrator talks
//! to. [`SystemGit`] is the real implementation; tests swap in mocks to
//! drive the state machine without touching a repository.

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::drift;
use crate::error::{Error, Result};
use crate::repository::Repository;
use crate::runner::CommandRunner;

/// Trait for the git operations the orchestrator needs - allows mocking in
/// tests.
pub trait GitOperations: Send + Sync {
    /// Clones the mirror from its remote and checks out its branch.
    fn clone_repo(&self, repo: &Repository) -> Result<()>;

    /// Refreshes the mirror's remote-tracking refs.
    fn fetch(&self, repo: &Repository) -> Result<()>;

    /// Whether the working tree has no staged, unstaged or untracked changes.
    fn is_clean(&self, repo: &Repository) -> bool;

    /// Whether local history equals the history of `origin/<branch>`.
    fn commits_match(&self, repo: &Repository) -> bool;

    /// Forces the mirror and its submodules back to `origin/<branch>`.
    fn rinse(&self, repo: &Repository) -> Result<()>;

    /// Pulls and updates submodules.
    fn pull(&self, repo: &Repository) -> Result<()>;

    /// Name of the branch checked out in the mirror.
    fn current_branch(&self, repo: &Repository) -> Result<String>;
}

/// The default implementation of `GitOperations`, which runs the system's
/// `git` binary.
///
/// This uses the system git command, which automatically handles SSH keys,
/// credential helpers and anything configured in `~/.gitconfig`.
#[derive(Debug, Clone, Default)]
pub struct SystemGit {
    runner: CommandRunner,
}

impl SystemGit {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }
}

impl GitOperations for SystemGit {
    fn clone_repo(&self, repo: &Repository) -> Result<()> {
        clone(&self.runner, repo)
    }

    fn fetch(&self, repo: &Repository) -> Result<()> {
        fetch(&self.runner, repo)
    }

    fn is_clean(&self, repo: &Repository) -> bool {
        drift::is_clean(&self.runner, &repo.path)
    }

    fn commits_match(&self, repo: &Repository) -> bool {
        drift::commits_match(&self.runner, repo)
    }

    fn rinse(&self, repo: &Repository) -> Result<()> {
        rinse(&self.runner, repo)
    }

    fn pull(&self, repo: &Repository) -> Result<()> {
        pull(&self.runner, repo)
    }

    fn current_branch(&self, repo: &Repository) -> Result<String> {
        current_branch(&self.runner, &repo.path)
    }
}

/// Clone a mirror with its submodules and check out the tracked branch.
///
/// The clone runs from the mirror's parent directory, which is created if
/// needed. When the branch cannot be checked out the fresh clone is removed
/// again. A submodule that lacks the branch is logged and left on whatever
/// the superproject recorded.
pub fn clone(runner: &CommandRunner, repo: &Repository) -> Result<()> {
    let parent = repo.parent_dir();
    fs::create_dir_all(parent)?;

    let target = repo.path.to_string_lossy();
    runner.run_checked(parent, &["clone", "--recursive", repo.url.as_str(), target.as_ref()])?;
    if let Err(e) = runner.run_checked(&repo.path, &["checkout", &repo.branch]) {
        // install skips existing directories, so none may be left behind
        if let Err(remove) = fs::remove_dir_all(&repo.path) {
            warn!(
                "{}: could not remove partial clone at {}: {}",
                repo.name,
                repo.path.display(),
                remove
            );
        }
        return Err(e);
    }

    let submodules = runner.run(
        &repo.path,
        &["submodule", "foreach", "git", "checkout", &repo.branch],
    )?;
    if !submodules.success {
        warn!(
            "{}: submodules could not check out '{}': {}",
            repo.name,
            repo.branch,
            submodules.display()
        );
    }

    info!("cloned {} into {}", repo.url, repo.path.display());
    Ok(())
}

/// Fetch remote refs for a mirror.
pub fn fetch(runner: &CommandRunner, repo: &Repository) -> Result<()> {
    runner.run_checked(&repo.path, &["fetch"])?;
    Ok(())
}

/// Reset a mirror and its submodules to `origin/<branch>` and delete every
/// untracked and ignored file.
///
/// Stops at the first failing step.
pub fn rinse(runner: &CommandRunner, repo: &Repository) -> Result<()> {
    let remote_branch = repo.remote_branch();
    let steps: [&[&str]; 5] = [
        &["clean", "-xdff"],
        &["reset", "--hard", remote_branch.as_str()],
        &["submodule", "foreach", "--recursive", "git", "clean", "-xdff"],
        &["submodule", "foreach", "--recursive", "git", "reset", "--hard"],
        &["submodule", "update", "--init", "--recursive"],
    ];
    for step in steps {
        runner.run_checked(&repo.path, step)?;
    }
    Ok(())
}

/// Pull the tracked branch and bring submodules along.
pub fn pull(runner: &CommandRunner, repo: &Repository) -> Result<()> {
    runner.run_checked(&repo.path, &["pull"])?;
    runner.run_checked(&repo.path, &["submodule", "update", "--recursive"])?;
    Ok(())
}

/// Name of the branch currently checked out in `dir`.
pub fn current_branch(runner: &CommandRunner, dir: &Path) -> Result<String> {
    let output = runner.run_checked(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(output.trim().to_string())
}

/// All tags known to the mirror.
pub fn list_tags(runner: &CommandRunner, repo: &Repository) -> Result<Vec<String>> {
    let output = runner.run_checked(&repo.path, &["tag", "-l"])?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect())
}

/// Create an annotated tag at HEAD.
pub fn add_tag(runner: &CommandRunner, repo: &Repository, tag: &str) -> Result<()> {
    let message = format!("{} created by gpack", tag);
    runner.run_checked(&repo.path, &["tag", "-a", tag, "-m", &message])?;
    Ok(())
}

/// Check out a tag on a new `build_<tag>` branch.
pub fn checkout_tag(runner: &CommandRunner, repo: &Repository, tag: &str) -> Result<String> {
    let tag_ref = format!("tags/{}", tag);
    let branch = format!("build_{}", tag);
    runner.run_checked(&repo.path, &["checkout", &tag_ref])?;
    runner.run_checked(&repo.path, &["checkout", "-b", &branch])?;
    Ok(branch)
}

/// Check out an existing branch, or create it when `create` is set and the
/// branch does not exist.
pub fn checkout_branch(
    runner: &CommandRunner,
    repo: &Repository,
    branch: &str,
    create: bool,
) -> Result<()> {
    let outcome = runner.run(&repo.path, &["checkout", branch])?;
    if outcome.success {
        return Ok(());
    }
    if !create {
        return Err(Error::GitCommand {
            command: format!("checkout {}", branch),
            path: repo.path.clone(),
            output: outcome.display(),
        });
    }
    runner.run_checked(&repo.path, &["checkout", "-b", branch])?;
    Ok(())
}

/// Stage everything, commit with `message` and push the current branch to
/// `origin`.
pub fn push(runner: &CommandRunner, repo: &Repository, message: &str) -> Result<String> {
    let branch = current_branch(runner, &repo.path)?;
    runner.run_checked(&repo.path, &["add", "-A"])?;
    runner.run_checked(&repo.path, &["commit", "-m", message])?;
    runner.run_checked(&repo.path, &["push", "--set-upstream", "origin", &branch])?;
    Ok(branch)
}
