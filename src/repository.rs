//! # Repository Descriptors
//!
//! A [`Repository`] is the immutable identity of one mirror: where it comes
//! from, where it lives on disk, which branch it tracks and whether it should
//! be kept read-only. Descriptors are built once per run by the configuration
//! loader and passed by reference everywhere else.
//!
//! Two descriptors are equal when they point at the same directory. The
//! loader guarantees that no two descriptors in a fleet share a directory.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// One configured mirror.
#[derive(Debug, Clone)]
pub struct Repository {
    /// Remote the mirror is cloned from.
    pub url: String,
    /// Absolute path of the mirror's working tree.
    pub path: PathBuf,
    /// Branch the mirror tracks on `origin`.
    pub branch: String,
    /// Whether the mirror is kept read-only after clone and sync.
    pub lock: bool,
    /// Final segment of `path`, used in messages and on the command line.
    pub name: String,
}

impl Repository {
    /// Builds a descriptor, resolving `local_dir` against `root`.
    pub fn new(root: &Path, url: &str, local_dir: &str, branch: &str, lock: bool) -> Self {
        let path = normalize(&root.join(local_dir));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| local_dir.to_string());

        Self {
            url: url.to_string(),
            path,
            branch: branch.to_string(),
            lock,
            name,
        }
    }

    /// Directory the clone is run from.
    pub fn parent_dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    /// The remote-tracking ref this mirror is reset to, e.g. `origin/main`.
    pub fn remote_branch(&self) -> String {
        format!("origin/{}", self.branch)
    }

    /// Whether the mirror's working tree is on disk.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }
}

impl PartialEq for Repository {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Repository {}

impl Hash for Repository {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Lexically resolves `.` and `..` components so that `libs/../libs/core`
/// and `libs/core` map to the same mirror.
/// Lexically resolves `.` and `..` without touching the file system.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
