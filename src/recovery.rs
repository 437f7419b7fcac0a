//! # Recovery Orchestration
//!
//! The [`Orchestrator`] brings one mirror into a known-good state. It
//! combines the drift checks and git commands behind [`GitOperations`] with
//! the [`LockLedger`], and records every significant transition as an
//! [`Event`] in the returned [`MirrorReport`].
//!
//! ## Update pass
//!
//! 1. A missing mirror is cloned and locked according to its policy.
//! 2. A dirty mirror that is locked is an anomaly: it is unlocked and
//!    rinsed. A dirty mirror that is unlocked holds local work and is left
//!    alone for this pass.
//! 3. Remote refs are fetched.
//! 4. A locked mirror whose history differs from `origin/<branch>` is
//!    pulled. If the pull leaves the tree dirty or still diverged it is
//!    rinsed once more, and if that does not help the mirror is `Failed`.
//! 5. A mirror that was locked on entry is locked again.
//!
//! [`Orchestrator::update_or_reclone`] adds the fleet-level fallback: a
//! mirror that ends `Failed` is deleted and cloned from scratch. Mirrors are
//! disposable caches of their remote, so this is always safe.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use log::{info, warn};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::git::GitOperations;
use crate::ledger::{LedgerChange, LockLedger};
use crate::permissions::{self, Action};
use crate::repository::Repository;

/// Where a mirror stands after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorState {
    /// No working tree on disk.
    Absent,
    /// Working tree has local changes that were left in place.
    Dirty,
    /// History differs from the remote branch.
    Diverged,
    /// Clean and, for locked mirrors, matching the remote branch.
    Synced,
    /// Could not be brought into a consistent state.
    Failed,
}

impl fmt::Display for MirrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MirrorState::Absent => "absent",
            MirrorState::Dirty => "dirty",
            MirrorState::Diverged => "diverged",
            MirrorState::Synced => "synced",
            MirrorState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A significant transition during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Cloned,
    Locked,
    Unlocked,
    /// A locked mirror had local modifications.
    RinsedDirty,
    /// The pull left the tree dirty or diverged.
    RinsedAfterPull,
    Rinsed,
    Pulled,
    /// An unlocked mirror holds local work and was not synchronized.
    NotSynchronized,
    /// A non-fatal command failed.
    CommandFailed(String),
    /// Permission changes that were skipped.
    PermissionsSkipped(usize),
    /// The mirror directory was not on disk.
    Missing,
    /// A stale ledger entry was removed.
    Pruned,
    Removed,
    Recloned,
    Failed(String),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Cloned => write!(f, "cloned"),
            Event::Locked => write!(f, "locked"),
            Event::Unlocked => write!(f, "unlocked"),
            Event::RinsedDirty => write!(f, "not clean, rinsed"),
            Event::RinsedAfterPull => write!(f, "not clean after pull, rinsed"),
            Event::Rinsed => write!(f, "rinsed"),
            Event::Pulled => write!(f, "commits didn't match, pulled"),
            Event::NotSynchronized => write!(f, "unlocked and not clean, not synchronized"),
            Event::CommandFailed(message) => write!(f, "{}", message),
            Event::PermissionsSkipped(count) => {
                write!(f, "{} entries kept their permissions (see warnings)", count)
            }
            Event::Missing => write!(f, "does not exist, try running gpack install"),
            Event::Pruned => write!(f, "does not exist, removed from lock ledger"),
            Event::Removed => write!(f, "removed"),
            Event::Recloned => write!(f, "could not be restored, deleted and recloned"),
            Event::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Result of one per-mirror operation.
#[derive(Debug, Clone)]
pub struct MirrorReport {
    pub name: String,
    pub path: PathBuf,
    pub state: MirrorState,
    pub events: Vec<Event>,
}

impl MirrorReport {
    fn new(repo: &Repository, state: MirrorState) -> Self {
        Self {
            name: repo.name.clone(),
            path: repo.path.clone(),
            state,
            events: Vec::new(),
        }
    }

    fn push(&mut self, event: Event) {
        info!("{}: {}", self.name, event);
        self.events.push(event);
    }

    /// Builds the report for a mirror whose operation returned an error.
    pub fn failed(repo: &Repository, error: &Error) -> Self {
        let mut report = Self::new(repo, MirrorState::Failed);
        report.push(Event::Failed(error.to_string()));
        report
    }

    pub fn is_failed(&self) -> bool {
        self.state == MirrorState::Failed
    }
}

/// Read-only snapshot of a mirror, as printed by `gpack check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorStatus {
    pub name: String,
    pub path: PathBuf,
    pub exists: bool,
    pub locked: bool,
    pub clean: bool,
    pub commits_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl MirrorStatus {
    /// False only for a locked mirror that is dirty or behind its remote.
    pub fn is_consistent(&self) -> bool {
        !self.exists || !self.locked || (self.clean && self.commits_match)
    }
}

/// Drives the per-mirror state machine.
pub struct Orchestrator<'a> {
    git: &'a dyn GitOperations,
    ledger: &'a LockLedger,
}

impl<'a> Orchestrator<'a> {
    pub fn new(git: &'a dyn GitOperations, ledger: &'a LockLedger) -> Self {
        Self { git, ledger }
    }

    /// Clones a missing mirror and applies its lock policy. Existing mirrors
    /// are left untouched.
    pub fn install(&self, repo: &Repository) -> Result<MirrorReport> {
        let mut report = MirrorReport::new(repo, MirrorState::Synced);
        if !repo.exists() {
            self.clone_and_apply_policy(repo, &mut report)?;
        }
        Ok(report)
    }

    /// Runs one synchronization pass over a mirror.
    ///
    /// Irreconcilable mirrors come back as `Ok` with state `Failed`; `Err` is
    /// reserved for a command or ledger failure that interrupted the pass.
    pub fn update(&self, repo: &Repository) -> Result<MirrorReport> {
        let mut report = MirrorReport::new(repo, MirrorState::Synced);

        if !repo.exists() {
            report.state = MirrorState::Absent;
            self.clone_and_apply_policy(repo, &mut report)?;
            report.state = MirrorState::Synced;
            return Ok(report);
        }

        let locked = self.ledger.is_locked(repo)?;

        if !self.git.is_clean(repo) {
            if !locked {
                report.state = MirrorState::Dirty;
                report.push(Event::NotSynchronized);
                return Ok(report);
            }
            self.unlock(repo, &mut report)?;
            self.git.rinse(repo)?;
            report.push(Event::RinsedDirty);
            if !self.git.is_clean(repo) {
                self.mark_irreconcilable(repo, &mut report);
                return Ok(report);
            }
        }

        if let Err(e) = self.git.fetch(repo) {
            warn!("{}: fetch failed: {}", repo.name, e);
            report.push(Event::CommandFailed(format!("fetch failed: {}", e)));
        }

        if locked && !self.git.commits_match(repo) {
            report.state = MirrorState::Diverged;
            self.unlock(repo, &mut report)?;
            match self.git.pull(repo) {
                Ok(()) => report.push(Event::Pulled),
                Err(e) => {
                    warn!("{}: pull failed: {}", repo.name, e);
                    report.push(Event::CommandFailed(format!("pull failed: {}", e)));
                }
            }

            if !self.git.is_clean(repo) || !self.git.commits_match(repo) {
                if let Err(e) = self.git.rinse(repo) {
                    warn!("{}: rinse failed: {}", repo.name, e);
                }
                report.push(Event::RinsedAfterPull);
                if !self.git.is_clean(repo) {
                    self.mark_irreconcilable(repo, &mut report);
                    return Ok(report);
                }
            }
            report.state = MirrorState::Synced;
        }

        if locked {
            self.lock(repo, &mut report)?;
        }
        Ok(report)
    }

    /// Runs an update pass and falls back to delete-and-reclone when the
    /// mirror cannot be restored in place.
    ///
    /// Never returns an error: failures are confined to this mirror's report.
    pub fn update_or_reclone(&self, repo: &Repository) -> MirrorReport {
        let mut report = match self.update(repo) {
            Ok(report) if !report.is_failed() => return report,
            Ok(report) => report,
            Err(e) => {
                warn!("{}: update interrupted: {}", repo.name, e);
                let recoverable = matches!(
                    e,
                    Error::GitCommand { .. } | Error::Timeout { .. } | Error::Irreconcilable { .. }
                );
                let report = MirrorReport::failed(repo, &e);
                if !recoverable || !repo.exists() {
                    return report;
                }
                report
            }
        };

        match self.reclone(repo, &mut report) {
            Ok(()) => report.state = MirrorState::Synced,
            Err(e) => {
                report.state = MirrorState::Failed;
                report.push(Event::Failed(e.to_string()));
            }
        }
        report
    }

    /// Rinses a mirror back to its remote branch, keeping its lock state.
    pub fn clean(&self, repo: &Repository) -> Result<MirrorReport> {
        let mut report = MirrorReport::new(repo, MirrorState::Synced);
        if !repo.exists() {
            report.state = MirrorState::Absent;
            report.push(Event::Missing);
            return Ok(report);
        }

        let locked = self.ledger.is_locked(repo)?;
        if locked {
            self.unlock(repo, &mut report)?;
        }
        let rinsed = self.git.rinse(repo);
        if locked {
            self.lock(repo, &mut report)?;
        }
        rinsed?;
        report.push(Event::Rinsed);
        Ok(report)
    }

    /// Deletes a mirror from disk and drops its ledger entry.
    pub fn uninstall(&self, repo: &Repository) -> Result<MirrorReport> {
        let mut report = MirrorReport::new(repo, MirrorState::Absent);
        if !repo.exists() {
            report.push(Event::Missing);
            return Ok(report);
        }
        self.remove(repo, &mut report)?;
        Ok(report)
    }

    /// Locks a mirror through the ledger.
    pub fn lock_mirror(&self, repo: &Repository) -> Result<MirrorReport> {
        let mut report = MirrorReport::new(repo, MirrorState::Synced);
        self.lock(repo, &mut report)?;
        Ok(report)
    }

    /// Unlocks a mirror through the ledger.
    pub fn unlock_mirror(&self, repo: &Repository) -> Result<MirrorReport> {
        let mut report = MirrorReport::new(repo, MirrorState::Synced);
        self.unlock(repo, &mut report)?;
        Ok(report)
    }

    /// Reports the mirror's lock and drift state. Nothing on disk changes;
    /// with `fetch` the remote-tracking refs are refreshed first.
    pub fn status(&self, repo: &Repository, fetch: bool) -> Result<MirrorStatus> {
        let exists = repo.exists();
        if exists && fetch {
            if let Err(e) = self.git.fetch(repo) {
                warn!("{}: fetch failed: {}", repo.name, e);
            }
        }
        Ok(MirrorStatus {
            name: repo.name.clone(),
            path: repo.path.clone(),
            exists,
            locked: exists && self.ledger.is_locked(repo)?,
            clean: exists && self.git.is_clean(repo),
            commits_match: exists && self.git.commits_match(repo),
            branch: if exists {
                self.git.current_branch(repo).ok()
            } else {
                None
            },
        })
    }

    /// The mirror stays unlocked so the reclone fallback can remove it.
    fn mark_irreconcilable(&self, repo: &Repository, report: &mut MirrorReport) {
        report.state = MirrorState::Failed;
        report.push(Event::Failed(
            Error::Irreconcilable {
                name: repo.name.clone(),
            }
            .to_string(),
        ));
    }

    fn reclone(&self, repo: &Repository, report: &mut MirrorReport) -> Result<()> {
        if repo.exists() {
            self.remove(repo, report)?;
        }
        self.clone_and_apply_policy(repo, report)?;
        report.push(Event::Recloned);
        Ok(())
    }

    fn remove(&self, repo: &Repository, report: &mut MirrorReport) -> Result<()> {
        // a read-only tree cannot be deleted by its owner
        permissions::apply(&repo.path, Action::Unlock)?;
        fs::remove_dir_all(&repo.path)?;
        report.push(Event::Removed);
        if self.ledger.lock(repo)? == LedgerChange::Pruned {
            report.push(Event::Pruned);
        }
        Ok(())
    }

    fn clone_and_apply_policy(&self, repo: &Repository, report: &mut MirrorReport) -> Result<()> {
        self.git.clone_repo(repo)?;
        report.push(Event::Cloned);
        if repo.lock {
            self.lock(repo, report)
        } else {
            self.unlock(repo, report)
        }
    }

    fn lock(&self, repo: &Repository, report: &mut MirrorReport) -> Result<()> {
        let change = self.ledger.lock(repo)?;
        self.record(change, Event::Locked, report);
        Ok(())
    }

    fn unlock(&self, repo: &Repository, report: &mut MirrorReport) -> Result<()> {
        let change = self.ledger.unlock(repo)?;
        self.record(change, Event::Unlocked, report);
        Ok(())
    }

    fn record(&self, change: LedgerChange, applied: Event, report: &mut MirrorReport) {
        match change {
            LedgerChange::Applied(permissions) => {
                report.push(applied);
                if !permissions.skipped.is_empty() {
                    report.push(Event::PermissionsSkipped(permissions.skipped.len()));
                }
            }
            LedgerChange::Missing => report.push(Event::Missing),
            LedgerChange::Pruned => report.push(Event::Pruned),
        }
    }
}
