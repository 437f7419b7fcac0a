//! Default values for gpack.
//!
//! This module provides centralized file names and limits used across
//! commands, ensuring consistency and avoiding duplication.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the repository configuration file, relative to the root directory.
pub const CONFIG_FILENAME: &str = "GpackRepos";

/// Name of the lock ledger, relative to the root directory.
pub const LEDGER_FILENAME: &str = ".gpacklock";

/// Name of the downloaded SSH key, relative to the root directory.
pub const KEY_FILENAME: &str = ".temp_ssh_key";

/// Reserved top-level key in GpackRepos that holds tool settings rather than
/// a repository.
pub const CONFIG_SECTION: &str = "config";

/// Name of the version-control metadata entry skipped by permission walks.
pub const VCS_METADATA: &str = ".git";

/// Label substituted for "fatal"/"error" when git output is shown to users.
pub const OUTPUT_LABEL: &str = "gpack";

/// Upper bound on a single git invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Returns the path of the lock ledger for a root directory.
pub fn ledger_path(root: &Path) -> PathBuf {
    root.join(LEDGER_FILENAME)
}

/// Returns the path of the repository configuration for a root directory.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILENAME)
}
