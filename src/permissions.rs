//! # Permission Enforcement
//!
//! Projects a mirror's lock state onto the filesystem by clearing or setting
//! the owner-write bit on every file and directory of its working tree.
//!
//! The walk skips the version-control metadata entry (`.git`, whether it is
//! a directory or a submodule's gitfile) at any depth, and never follows or
//! changes symlinks. Files are processed before directories. When locking,
//! directories are processed deepest-first so a parent keeps its write bit
//! until all of its children are done.
//!
//! Enforcement is best-effort: an entry that vanished mid-walk is ignored,
//! and an entry whose mode cannot be changed is recorded as a [`Skip`] and
//! logged as a warning. Only a missing or unreadable mirror root is an error.

use std::fs::{self, Permissions};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::defaults::VCS_METADATA;
use crate::error::{Error, Result};

/// What to do with the owner-write bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Clear the owner-write bit.
    Lock,
    /// Set the owner-write bit.
    Unlock,
}

/// An entry the walk could not change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of one enforcement pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionReport {
    /// Entries whose mode was changed.
    pub changed: usize,
    /// Entries left untouched because of an error.
    pub skipped: Vec<Skip>,
}

impl PermissionReport {
    fn skip(&mut self, path: &Path, reason: String) {
        warn!("skipping {}: {}", path.display(), reason);
        self.skipped.push(Skip {
            path: path.to_path_buf(),
            reason,
        });
    }
}

/// Applies `action` to every file and directory under `root`.
pub fn apply(root: &Path, action: Action) -> Result<PermissionReport> {
    // the root must exist; everything below it is best-effort
    fs::symlink_metadata(root)?;

    let mut report = PermissionReport::default();
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != VCS_METADATA);

    for entry in walker {
        match entry {
            Ok(entry) => {
                let file_type = entry.file_type();
                if file_type.is_symlink() {
                    debug!("not following symlink {}", entry.path().display());
                } else if file_type.is_dir() {
                    dirs.push(entry);
                } else {
                    files.push(entry);
                }
            }
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                if is_not_found(&err) {
                    debug!("{} vanished during walk", path.display());
                } else {
                    report.skip(&path, err.to_string());
                }
            }
        }
    }

    if action == Action::Lock {
        // children before parents
        dirs.sort_by(|a, b| b.depth().cmp(&a.depth()));
    }

    for entry in files.iter().chain(dirs.iter()) {
        set_owner_write(entry, action, &mut report);
    }

    debug!(
        "{:?} {}: {} changed, {} skipped",
        action,
        root.display(),
        report.changed,
        report.skipped.len()
    );
    Ok(report)
}

/// Whether the owner-write bit is set on `path`.
pub fn is_owner_writable(path: &Path) -> Result<bool> {
    let metadata = fs::symlink_metadata(path)?;
    Ok(owner_writable(&metadata.permissions()))
}

fn set_owner_write(entry: &DirEntry, action: Action, report: &mut PermissionReport) {
    let path = entry.path();
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} vanished before its mode was changed", path.display());
            return;
        }
        Err(e) => {
            report.skip(path, e.to_string());
            return;
        }
    };

    let writable = action == Action::Unlock;
    let current = metadata.permissions();
    if owner_writable(&current) == writable {
        return;
    }

    match fs::set_permissions(path, with_owner_write(current, writable)) {
        Ok(()) => report.changed += 1,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} vanished before its mode was changed", path.display());
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            let reason = Error::PermissionDenied {
                path: path.to_path_buf(),
            };
            report.skip(path, reason.to_string());
        }
        Err(e) => report.skip(path, e.to_string()),
    }
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}

#[cfg(unix)]
fn owner_writable(permissions: &Permissions) -> bool {
    use std::os::unix::fs::PermissionsExt;
    permissions.mode() & 0o200 != 0
}

#[cfg(unix)]
fn with_owner_write(permissions: Permissions, writable: bool) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    let mode = permissions.mode();
    let mode = if writable { mode | 0o200 } else { mode & !0o200 };
    Permissions::from_mode(mode)
}

#[cfg(not(unix))]
fn owner_writable(permissions: &Permissions) -> bool {
    !permissions.readonly()
}

#[cfg(not(unix))]
fn with_owner_write(mut permissions: Permissions, writable: bool) -> Permissions {
    permissions.set_readonly(!writable);
    permissions
}
