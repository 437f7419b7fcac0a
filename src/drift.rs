//! Drift detection: is the working tree clean, and does local history match
//! the remote branch?
//!
//! Both checks fail towards "drifted". A status or log query that cannot be
//! answered (no network, missing ref, broken repository) reports the mirror
//! as dirty or mismatched so that the orchestrator corrects it instead of
//! trusting stale state.

use std::path::Path;

use log::debug;

use crate::repository::Repository;
use crate::runner::CommandRunner;

/// Snapshot of a mirror's drift, computed fresh on every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftResult {
    pub is_clean: bool,
    pub commits_match: bool,
}

/// True when `git status` reports no staged, unstaged or untracked changes.
pub fn is_clean(runner: &CommandRunner, path: &Path) -> bool {
    match runner.run(path, &["status", "--porcelain", "--untracked-files=all"]) {
        Ok(outcome) if outcome.success => outcome.output.trim().is_empty(),
        Ok(outcome) => {
            debug!("status failed in {}: {}", path.display(), outcome.display());
            false
        }
        Err(e) => {
            debug!("status could not run in {}: {}", path.display(), e);
            false
        }
    }
}

/// True when the history of HEAD is identical to the history of
/// `origin/<branch>`.
pub fn commits_match(runner: &CommandRunner, repo: &Repository) -> bool {
    let remote_branch = repo.remote_branch();
    let local = history(runner, &repo.path, "HEAD");
    let remote = history(runner, &repo.path, &remote_branch);
    match (local, remote) {
        (Some(local), Some(remote)) => local == remote,
        _ => false,
    }
}

/// Computes both drift checks.
pub fn detect(runner: &CommandRunner, repo: &Repository) -> DriftResult {
    DriftResult {
        is_clean: is_clean(runner, &repo.path),
        commits_match: commits_match(runner, repo),
    }
}

fn history(runner: &CommandRunner, path: &Path, rev: &str) -> Option<String> {
    match runner.run(path, &["log", "--format=%H", rev]) {
        Ok(outcome) if outcome.success => Some(outcome.output),
        Ok(outcome) => {
            debug!("log {} failed in {}: {}", rev, path.display(), outcome.display());
            None
        }
        Err(e) => {
            debug!("log {} could not run in {}: {}", rev, path.display(), e);
            None
        }
    }
}
